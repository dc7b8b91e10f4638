use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::users::store::StoreError;

/// Errors surfaced to clients. Every variant maps to exactly one status code
/// and the uniform `{"status":"error","message":...}` envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Invalid credentials")]
    Auth,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            // Internal detail is logged, never sent to the client.
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                "An internal server error occurred.".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(json!({ "status": "error", "message": message }));
        (self.status(), body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound("User not found".into()),
            StoreError::Conflict { email } => {
                ApiError::Conflict(format!("User with email {email} already exists."))
            }
            StoreError::AuthFailed => ApiError::Auth,
            StoreError::Backend(e) => ApiError::Internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_expected_statuses() {
        let cases = [
            (StoreError::NotFound, StatusCode::NOT_FOUND),
            (
                StoreError::Conflict {
                    email: "a@b.c".into(),
                },
                StatusCode::CONFLICT,
            ),
            (StoreError::AuthFailed, StatusCode::UNAUTHORIZED),
            (
                StoreError::Backend(anyhow::anyhow!("pool exhausted")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (store_err, status) in cases {
            assert_eq!(ApiError::from(store_err).status(), status);
        }
    }

    #[test]
    fn conflict_message_names_the_email() {
        let err = ApiError::from(StoreError::Conflict {
            email: "jane@example.com".into(),
        });
        assert_eq!(
            err.to_string(),
            "User with email jane@example.com already exists."
        );
    }

    #[test]
    fn internal_error_never_leaks_detail() {
        let err = ApiError::Internal(anyhow::anyhow!("connection refused (db=10.0.0.3)"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
