use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    /// Message safe to echo back to a connected client. Storage details
    /// stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            AppError::InvalidTarget(msg) => format!("invalid target: {msg}"),
            AppError::NotFound => "not found".to_string(),
            AppError::Conflict(msg) => format!("conflict: {msg}"),
            _ => "internal server error".to_string(),
        }
    }
}
