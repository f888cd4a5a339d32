use thiserror::Error;

/// Errors raised by rooms and their message stores.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid room name '{0}'")]
    InvalidRoomName(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
