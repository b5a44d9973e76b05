use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use chatterbox_bot::BotError;
use chatterbox_store::StoreError;

use crate::auth::AuthError;

/// Body of every 500 response; internal detail stays in the log.
pub const GENERIC_ERROR: &str = "An error occurred";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServerError::NotFound("Not found".into()),
            StoreError::Forbidden => {
                ServerError::Forbidden("That conversation belongs to someone else".into())
            }
            StoreError::AlreadyExists(what) => ServerError::Conflict(format!("{what} already exists")),
            StoreError::Invalid(msg) => ServerError::BadRequest(msg),
            other => ServerError::Storage(other),
        }
    }
}

impl From<BotError> for ServerError {
    fn from(e: BotError) -> Self {
        match e {
            BotError::Invalid(msg) => ServerError::BadRequest(msg),
            BotError::Store(e) => e.into(),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ServerError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::DuplicateUsername => ServerError::Conflict(e.to_string()),
            AuthError::WeakPassword { .. } | AuthError::InvalidUsername(_) => {
                ServerError::BadRequest(e.to_string())
            }
            AuthError::InvalidCredentials => ServerError::Unauthorized,
            AuthError::Store(e) => e.into(),
            AuthError::Hashing(msg) => ServerError::Internal(msg),
        }
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(e: tokio::task::JoinError) -> Self {
        ServerError::Internal(format!("Blocking task failed: {e}"))
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, label) = match &self {
            ServerError::BadRequest(msg) => return (StatusCode::BAD_REQUEST, msg.clone()).into_response(),
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, "Forbidden"),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
            ServerError::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            ServerError::Storage(_) | ServerError::Internal(_) => {
                error!(error = %self, "Request failed");
                let body = serde_json::json!({ "status": "Error", "error": GENERIC_ERROR });
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
            }
        };

        let body = match &self {
            ServerError::Unauthorized => serde_json::json!({ "status": label }),
            _ => serde_json::json!({ "status": label, "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_storage_error_hides_detail() {
        let resp = ServerError::from(StoreError::Migration("table exploded".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "Error");
        assert_eq!(json["error"], GENERIC_ERROR);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        assert_eq!(
            ServerError::from(AuthError::DuplicateUsername).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServerError::from(AuthError::WeakPassword { min: 6 }).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::from(StoreError::Forbidden).into_response().status(),
            StatusCode::FORBIDDEN
        );

        let resp = ServerError::Unauthorized.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await, serde_json::json!({ "status": "Unauthorized" }));
    }
}
