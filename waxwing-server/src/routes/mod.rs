pub mod v1;

use axum::Router;

use crate::infra::app_state::AppState;

/// The main API router.
pub fn create_api_router(state: AppState) -> Router<AppState> {
    v1::create_v1_router(state)
}
