//! Error types for the modelgate service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tonic::Status;

/// A specialized Result type for modelgate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for modelgate operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The artifact could not be loaded; fatal to service construction.
    #[error("artifact load failed: {0}")]
    ArtifactLoad(String),

    /// The request payload was malformed or incomplete; client-caused.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The artifact itself failed while computing a result.
    #[error("inference failed: {0}")]
    Inference(String),

    /// No cache client became available within the checkout wait bound.
    #[error("cache pool exhausted")]
    PoolExhausted,

    /// A cache client operation failed (network, protocol, timeout).
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Connection-level transport errors.
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<tonic::transport::Error> for Error {
    fn from(err: tonic::transport::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(msg) => Status::invalid_argument(msg),
            Error::Inference(msg) => Status::internal(format!("inference failed: {}", msg)),
            Error::ArtifactLoad(msg) => {
                Status::failed_precondition(format!("artifact load failed: {}", msg))
            }
            Error::PoolExhausted => Status::unavailable("cache pool exhausted"),
            Error::CacheUnavailable(msg) => {
                Status::unavailable(format!("cache unavailable: {}", msg))
            }
            Error::Transport(msg) => Status::unavailable(format!("transport error: {}", msg)),
            Error::Config(msg) => Status::failed_precondition(format!("config error: {}", msg)),
            Error::Io(err) => Status::internal(format!("I/O error: {}", err)),
            Error::Serialization(err) => {
                Status::internal(format!("serialization error: {}", err))
            }
        }
    }
}

impl Error {
    /// HTTP mapping for the REST surface. The body carries a stable
    /// machine-readable `type`/`code` pair so clients can tell invalid input,
    /// artifact failure, and unavailable dependencies apart.
    fn http_parts(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_request", "validation_failed"),
            Error::Inference(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "inference_error",
                "artifact_failed",
            ),
            Error::PoolExhausted => (
                StatusCode::SERVICE_UNAVAILABLE,
                "dependency_unavailable",
                "cache_pool_exhausted",
            ),
            Error::CacheUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "dependency_unavailable",
                "cache_backend_error",
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal",
            ),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, code) = self.http_parts();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": error_type,
                "code": code,
            }
        }));
        (status, body).into_response()
    }
}
