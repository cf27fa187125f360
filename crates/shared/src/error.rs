use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classes the catalog, suggestion and document services report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    InvalidRequest,
    CatalogUnavailable,
    SuggestionsUnavailable,
    DocumentRejected,
    Internal,
}

/// Error body of a failed backend response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// [`ApiError`] as a Rust error value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code:?}: {message}")]
pub struct BackendFailure {
    pub code: ErrorCode,
    pub message: String,
}

impl From<ApiError> for BackendFailure {
    fn from(body: ApiError) -> Self {
        Self {
            code: body.code,
            message: body.message,
        }
    }
}
