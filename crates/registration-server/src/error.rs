//! Error types for the registration server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use registration::{ErrorKind, RegistrationError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("Malformed request body: {0}")]
    BadRequest(String),

    #[error("Unknown or expired confirmation link")]
    InvalidLink,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            ServerError::Registration(e) => match e.kind() {
                ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
                ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
                ErrorKind::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::InvalidLink => StatusCode::NOT_FOUND,
            ServerError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Only rejections carry a machine-readable reason
        let code = match &self {
            ServerError::Registration(e) => match e.kind() {
                ErrorKind::UnprocessableEntity(reason) => reason.as_str(),
                ErrorKind::InternalError => {
                    error!("Request failed: {}", e);
                    status.canonical_reason().unwrap_or("internal_error")
                }
                _ => status.canonical_reason().unwrap_or_default(),
            },
            ServerError::InvalidLink => "invalid_or_expired_key",
            _ => status.canonical_reason().unwrap_or_default(),
        };

        let body = ErrorResponse {
            error: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registration::Reason;

    async fn body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_rejection_carries_reason() {
        let response =
            ServerError::from(RegistrationError::Rejected(Reason::InvalidSmsCode)).into_response();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body(response).await["error"], "invalid_sms_code");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            (RegistrationError::SessionExpired, StatusCode::UNAUTHORIZED),
            (
                RegistrationError::BadRequest("email address not confirmed"),
                StatusCode::BAD_REQUEST,
            ),
            (
                RegistrationError::CapacityReached,
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ServerError::from(err).into_response().status(), status);
        }
        assert_eq!(
            ServerError::RateLimitExceeded.into_response().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response =
            ServerError::from(RegistrationError::Credential("db password wrong".into()))
                .into_response();

        assert_eq!(body(response).await["error"], "Internal Server Error");
    }
}
