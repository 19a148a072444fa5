use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::errors::AppResult;
use crate::infra::app_state::AppState;

pub async fn health(State(state): State<AppState>) -> AppResult<Json<Value>> {
    state.db().ping().await?;
    Ok(Json(json!({ "status": "ok" })))
}
