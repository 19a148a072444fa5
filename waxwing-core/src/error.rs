use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("metadata service error ({status}): {message}")]
    Metadata { status: u16, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Errors worth retrying through the metadata client's backoff policy.
    pub fn is_transient(&self) -> bool {
        match self {
            CoreError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            CoreError::Metadata { status, .. } => *status == 503,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
