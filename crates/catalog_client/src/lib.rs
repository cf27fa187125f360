//! Client side of the hazard catalog backend: the [`CatalogBackend`] seam,
//! its reqwest implementation, document hand-off, and the lazy detail cache.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::HazardId,
    error::{ApiError, BackendFailure},
    protocol::{
        BatchDetailRequest, CatalogQuery, CatalogValidation, CategorySummary, DocumentExport,
        DocumentReceipt, HazardDetail, HazardSuggestion, HazardSummary, SuggestionRequest,
    },
};
use tracing::debug;

pub mod cache;
pub mod error;

pub use cache::{CatalogCache, CatalogEntry, DetailListener, PrefetchReport};
pub use error::CatalogClientError;

#[async_trait]
pub trait CatalogBackend: Send + Sync {
    async fn list_hazards(&self, query: &CatalogQuery) -> Result<Vec<HazardSummary>>;
    async fn list_categories(&self) -> Result<Vec<CategorySummary>>;
    async fn hazard_detail(&self, id: HazardId) -> Result<HazardDetail>;
    async fn hazard_details(&self, ids: &[HazardId]) -> Result<Vec<HazardDetail>>;
    async fn suggest_hazards(&self, request: &SuggestionRequest) -> Result<Vec<HazardSuggestion>>;
    async fn validate_catalog(&self) -> Result<CatalogValidation>;
}

/// Receives the finished wizard export.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn submit(&self, export: &DocumentExport) -> Result<DocumentReceipt>;
}

pub struct MissingCatalogBackend;

#[async_trait]
impl CatalogBackend for MissingCatalogBackend {
    async fn list_hazards(&self, _query: &CatalogQuery) -> Result<Vec<HazardSummary>> {
        Err(anyhow!("catalog backend is unavailable"))
    }

    async fn list_categories(&self) -> Result<Vec<CategorySummary>> {
        Err(anyhow!("catalog backend is unavailable"))
    }

    async fn hazard_detail(&self, id: HazardId) -> Result<HazardDetail> {
        Err(anyhow!("catalog backend is unavailable for hazard {}", id.0))
    }

    async fn hazard_details(&self, _ids: &[HazardId]) -> Result<Vec<HazardDetail>> {
        Err(anyhow!("catalog backend is unavailable"))
    }

    async fn suggest_hazards(&self, _request: &SuggestionRequest) -> Result<Vec<HazardSuggestion>> {
        Err(anyhow!("suggestion service is unavailable"))
    }

    async fn validate_catalog(&self) -> Result<CatalogValidation> {
        Err(anyhow!("catalog backend is unavailable"))
    }
}

pub struct MissingDocumentSink;

#[async_trait]
impl DocumentSink for MissingDocumentSink {
    async fn submit(&self, export: &DocumentExport) -> Result<DocumentReceipt> {
        Err(anyhow!(
            "document generation is unavailable for document {}",
            export.document_id
        ))
    }
}

#[derive(Clone)]
pub struct HttpCatalogClient {
    http: Client,
    base_url: String,
}

impl HttpCatalogClient {
    pub fn new(base_url: &str) -> std::result::Result<Self, CatalogClientError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(
        http: Client,
        base_url: &str,
    ) -> std::result::Result<Self, CatalogClientError> {
        let parsed = url::Url::parse(base_url).map_err(|source| CatalogClientError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CatalogClientError::UnsupportedScheme(base_url.to_string()));
        }
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode catalog response ({status})"));
    }

    let body = response.bytes().await.unwrap_or_default();
    match serde_json::from_slice::<ApiError>(&body) {
        Ok(api_error) => Err(CatalogClientError::Api {
            status: status.as_u16(),
            source: BackendFailure::from(api_error),
        }
        .into()),
        Err(_) => Err(CatalogClientError::Status {
            status: status.as_u16(),
        }
        .into()),
    }
}

#[async_trait]
impl CatalogBackend for HttpCatalogClient {
    async fn list_hazards(&self, query: &CatalogQuery) -> Result<Vec<HazardSummary>> {
        debug!(search = ?query.search, limit = ?query.limit, "catalog: list_hazards");
        let response = self
            .http
            .get(format!("{}/catalog/hazards", self.base_url))
            .query(query)
            .send()
            .await?;
        decode(response).await
    }

    async fn list_categories(&self) -> Result<Vec<CategorySummary>> {
        let response = self
            .http
            .get(format!("{}/catalog/categories", self.base_url))
            .send()
            .await?;
        decode(response).await
    }

    async fn hazard_detail(&self, id: HazardId) -> Result<HazardDetail> {
        debug!(hazard_id = id.0, "catalog: hazard_detail");
        let response = self
            .http
            .get(format!("{}/catalog/hazards/{}", self.base_url, id.0))
            .send()
            .await?;
        decode(response).await
    }

    async fn hazard_details(&self, ids: &[HazardId]) -> Result<Vec<HazardDetail>> {
        debug!(count = ids.len(), "catalog: hazard_details batch");
        let response = self
            .http
            .post(format!("{}/catalog/hazards/batch", self.base_url))
            .json(&BatchDetailRequest { ids: ids.to_vec() })
            .send()
            .await?;
        decode(response).await
    }

    async fn suggest_hazards(&self, request: &SuggestionRequest) -> Result<Vec<HazardSuggestion>> {
        let response = self
            .http
            .post(format!("{}/ai/hazard-suggestions", self.base_url))
            .json(request)
            .send()
            .await?;
        let mut suggestions: Vec<HazardSuggestion> = decode(response).await?;
        suggestions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Ok(suggestions)
    }

    async fn validate_catalog(&self) -> Result<CatalogValidation> {
        let response = self
            .http
            .get(format!("{}/catalog/validate", self.base_url))
            .send()
            .await?;
        decode(response).await
    }
}

#[async_trait]
impl DocumentSink for HttpCatalogClient {
    async fn submit(&self, export: &DocumentExport) -> Result<DocumentReceipt> {
        let response = self
            .http
            .post(format!("{}/documents", self.base_url))
            .json(export)
            .send()
            .await
            .with_context(|| format!("failed to submit document {}", export.document_id))?;
        decode(response).await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
