use shared::error::BackendFailure;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogClientError {
    #[error("invalid catalog base url '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("catalog base url '{0}' must use http or https")]
    UnsupportedScheme(String),
    #[error("catalog backend returned {status}: {source}")]
    Api { status: u16, source: BackendFailure },
    #[error("catalog backend returned {status}")]
    Status { status: u16 },
}
