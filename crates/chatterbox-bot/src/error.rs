use thiserror::Error;

use chatterbox_store::StoreError;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed knowledge file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure inside an adapter. Never shown to the user; each adapter maps it
/// to its own apology string.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("not configured")]
    NotConfigured,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid endpoint: {0}")]
    Endpoint(String),

    #[error("upstream answered {0}")]
    Status(reqwest::StatusCode),

    #[error("unexpected response: {0}")]
    Malformed(String),

    #[error("nothing found")]
    Empty,
}
