//! Server-specific error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use teddy_pcm::PcmError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Library error: {0}")]
    Library(#[from] PcmError),

    #[error("Batch not found: {0}")]
    BatchNotFound(String),

    #[error("Part not found: batch={batch_id}, part={part_name}")]
    PartNotFound { batch_id: String, part_name: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BatchNotFound(_) | ServerError::PartNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Library(PcmError::UnsupportedPlatform(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for the error metrics
    pub fn label(&self) -> &'static str {
        match self {
            ServerError::Library(e) => e.kind().as_str(),
            ServerError::BatchNotFound(_) => "batch_not_found",
            ServerError::PartNotFound { .. } => "part_not_found",
            ServerError::BadRequest(_) => "bad_request",
            ServerError::PayloadTooLarge(_) => "payload_too_large",
            ServerError::Config(_) => "config",
            ServerError::Internal(_) => "internal",
            ServerError::Io(_) => "io",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(serde_json::json!({
            "error": self.to_string(),
            "kind": self.label(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_statuses() {
        assert_eq!(
            ServerError::BatchNotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::PartNotFound {
                batch_id: "x".into(),
                part_name: "pcmData.0.pcm".into()
            }
            .status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_library_error_statuses() {
        let unsupported = ServerError::from(PcmError::UnsupportedPlatform("no swr".into()));
        assert_eq!(unsupported.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(unsupported.label(), "unsupported_platform");

        let task = ServerError::from(PcmError::Task("panicked".into()));
        assert_eq!(task.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_bad_request_response() {
        let response = ServerError::BadRequest("no files".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(axum::http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["kind"], "bad_request");
        assert_eq!(body["error"], "Bad request: no files");
    }
}
