//! Error types for web handlers.
//!
//! Every per-request failure ends here: it is mapped to a status code and a
//! `{"error": "<message>"}` body, and never propagates past the handler.

use axum::{
    Json,
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;
use todoflow_core::normalize::NormalizeError;
use todoflow_core::publisher::PublishError;

/// Message returned for bodies that cannot be decoded.
pub const INVALID_PAYLOAD: &str = "invalid payload";

/// Message returned when the caller identity is required but absent.
pub const MISSING_IDENTITY: &str = "Missing X-User-ID header";

/// Message returned when a command was not acknowledged.
pub const PUBLISH_FAILED: &str = "publish failed";

/// Application error type for web handlers.
///
/// The message is user-facing. The optional source is logged for server
/// errors and never sent to the client.
///
/// # Examples
///
/// ```ignore
/// async fn handler(Caller(caller): Caller, body: Bytes) -> Result<StatusCode, AppError> {
///     let command = normalize_create(&body, &caller)?;
///     Ok(StatusCode::ACCEPTED)
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// 404 for paths nothing is routed to.
    #[must_use]
    pub fn route_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "route not found")
    }

    /// 405 for a known path hit with an unsupported method.
    #[must_use]
    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Status code the error maps to.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// User-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody<'a> {
    pub(crate) error: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    message = %self.message,
                    error = %source,
                    "Request failed"
                );
            } else {
                tracing::error!(status = %self.status, message = %self.message, "Request failed");
            }
        } else {
            tracing::debug!(status = %self.status, message = %self.message, "Request rejected");
        }

        let body = ErrorBody {
            error: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("internal server error").with_source(err)
    }
}

impl From<NormalizeError> for AppError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::MalformedPayload(_) => {
                Self::bad_request(INVALID_PAYLOAD).with_source(anyhow::Error::new(err))
            }
            NormalizeError::Validation(message) => Self::bad_request(message),
        }
    }
}

impl From<PublishError> for AppError {
    fn from(err: PublishError) -> Self {
        Self::internal(PUBLISH_FAILED).with_source(anyhow::Error::new(err))
    }
}

/// The body could not be read. Keeps the rejection's status, e.g. 413.
impl From<BytesRejection> for AppError {
    fn from(rejection: BytesRejection) -> Self {
        Self::new(rejection.status(), INVALID_PAYLOAD)
            .with_source(anyhow::anyhow!(rejection.body_text()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use todoflow_core::stream::StreamError;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("title must not be empty");
        assert_eq!(err.to_string(), "[400] title must not be empty");
    }

    #[tokio::test]
    async fn test_body_has_only_error_field() {
        let (status, body) = body_of(AppError::unauthorized(MISSING_IDENTITY)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, serde_json::json!({"error": "Missing X-User-ID header"}));
    }

    #[test]
    fn test_malformed_payload_hides_decoder_detail() {
        let err = AppError::from(NormalizeError::MalformedPayload("EOF at line 1".to_string()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), INVALID_PAYLOAD);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_validation_message_is_shown() {
        let err = AppError::from(NormalizeError::Validation("todo id must not be empty".into()));
        assert_eq!(err.message(), "todo id must not be empty");
    }

    #[tokio::test]
    async fn test_publish_failure_is_500_without_detail() {
        let err = AppError::from(PublishError::Stream(StreamError::Unavailable(
            "broker-1:9092 refused".to_string(),
        )));
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "publish failed");
    }
}
