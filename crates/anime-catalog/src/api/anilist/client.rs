//! GraphQL catalog client (AniList).
//!
//! Requests are not queued; several may be in flight at once. Each one runs
//! under the same retry governor the REST queue uses.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use shared::{CanonicalAnime, FeedConfig, GraphQlConfig, Upstream};
use tracing::{debug, info, warn};

use super::queries::{browse_document, browse_variables, media_document, media_variables};
use super::types::{GraphQlErrorMessage, GraphQlResponse, MediaEnvelope, PageEnvelope};
use crate::api::error::CatalogError;
use crate::api::http::{build_client, read_json};
use crate::api::retry::{run_with_retry, RetryPolicy};
use crate::cache::ResponseCache;
use crate::normalize::{normalize, normalize_graphql_detail, ContentFilter, NormalizedPage, UpstreamPayload};
use crate::source::{CatalogSource, FeedQuery};

/// Largest `perPage` the upstream honors
pub const MAX_PAGE_SIZE: u32 = 50;

pub struct AniListClient {
    http: reqwest::Client,
    endpoint: String,
    /// Bearer token; anonymous when `None`
    token: Option<String>,
    retry: RetryPolicy,
    cache: Arc<ResponseCache>,
    filter: ContentFilter,
    per_page: u32,
}

impl AniListClient {
    pub fn new(
        graphql: &GraphQlConfig,
        token: Option<String>,
        feed: &FeedConfig,
        cache: Arc<ResponseCache>,
    ) -> anyhow::Result<Self> {
        info!(
            endpoint = %graphql.endpoint,
            authenticated = token.is_some(),
            max_retries = graphql.max_retries,
            "GraphQL client initialized"
        );

        Ok(Self {
            http: build_client(Duration::from_secs(graphql.timeout_secs))?,
            endpoint: graphql.endpoint.clone(),
            token,
            retry: RetryPolicy::new(graphql.max_retries, Duration::from_millis(graphql.retry_delay_ms)),
            cache,
            filter: ContentFilter::new(feed.excluded_genres.iter().cloned()),
            per_page: feed.per_page.clamp(1, MAX_PAGE_SIZE),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Run one document under the retry governor
    async fn execute<T: DeserializeOwned>(
        &self,
        label: &str,
        document: &str,
        variables: Value,
    ) -> Result<GraphQlResponse<T>, CatalogError> {
        run_with_retry(self.retry, label, || self.post::<T>(label, document, &variables)).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        label: &str,
        document: &str,
        variables: &Value,
    ) -> Result<GraphQlResponse<T>, CatalogError> {
        debug!(label, "GraphQL request");

        let mut request = self
            .http
            .post(&self.endpoint)
            .header(ACCEPT, "application/json")
            .json(&json!({
                "query": document,
                "variables": variables,
            }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let envelope: GraphQlResponse<T> = read_json(request.send().await?).await?;
        if envelope.data.is_none() && !envelope.errors.is_empty() {
            return Err(envelope_error(&envelope.errors));
        }
        if !envelope.errors.is_empty() {
            warn!(label, errors = envelope.errors.len(), "GraphQL response carried partial errors");
        }
        Ok(envelope)
    }

    /// One raw browse page
    pub async fn fetch_raw_page(&self, query: &FeedQuery, page: u32) -> Result<PageEnvelope, CatalogError> {
        let key = format!("{}_{}_p{}", Upstream::AniList, query.cache_key(), page);
        if let Some(cached) = self.cache.lookup::<PageEnvelope>(&key) {
            return Ok(cached);
        }

        let variables = browse_variables(query, page, self.per_page);
        let envelope: PageEnvelope = self.execute(&key, &browse_document(), variables).await?;

        self.cache.store(&key, &envelope);
        Ok(envelope)
    }
}

/// Error for a response that carried errors and no data
fn envelope_error(errors: &[GraphQlErrorMessage]) -> CatalogError {
    let message = errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");

    match errors.iter().filter_map(|e| e.status).max() {
        Some(429) => CatalogError::RateLimited { retry_after: None },
        Some(status) if status == 404 || status >= 500 => CatalogError::Api { status, message },
        _ => CatalogError::GraphQl(message),
    }
}

impl CatalogSource for AniListClient {
    fn upstream(&self) -> Upstream {
        Upstream::AniList
    }

    async fn fetch_page(&self, query: &FeedQuery, page: u32) -> Result<Option<NormalizedPage>, CatalogError> {
        let payload = UpstreamPayload::GraphQl(self.fetch_raw_page(query, page).await?);
        Ok(normalize(&payload, &self.filter))
    }

    async fn fetch_anime(&self, id: u64) -> Result<Option<CanonicalAnime>, CatalogError> {
        let key = format!("{}_anime_{}", Upstream::AniList, id);
        let envelope = match self.cache.lookup::<MediaEnvelope>(&key) {
            Some(cached) => cached,
            None => match self.execute(&key, &media_document(), media_variables(id)).await {
                Ok(envelope) => {
                    self.cache.store(&key, &envelope);
                    envelope
                }
                Err(CatalogError::Api { status: 404, .. }) => {
                    debug!(id, "Media not found");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            },
        };

        Ok(normalize_graphql_detail(&envelope, &self.filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Config;

    fn error(message: &str, status: Option<u16>) -> GraphQlErrorMessage {
        GraphQlErrorMessage {
            message: message.to_string(),
            status,
        }
    }

    #[test]
    fn test_envelope_error_rate_limit() {
        let err = envelope_error(&[error("Too Many Requests.", Some(429))]);
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_envelope_error_not_found() {
        let err = envelope_error(&[error("Not Found.", Some(404))]);
        assert!(matches!(err, CatalogError::Api { status: 404, .. }));
    }

    #[test]
    fn test_envelope_error_validation_is_not_retryable() {
        let err = envelope_error(&[
            error("Variable \"$page\" got invalid value", Some(400)),
            error("second", None),
        ]);
        match &err {
            CatalogError::GraphQl(message) => {
                assert!(message.contains("$page"));
                assert!(message.contains("; second"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_client_creation() {
        let config = Config::default();
        let cache = Arc::new(ResponseCache::disabled());

        let anonymous = AniListClient::new(&config.graphql, None, &config.feed, cache.clone()).unwrap();
        assert!(!anonymous.is_authenticated());
        assert_eq!(anonymous.upstream(), Upstream::AniList);

        let authed =
            AniListClient::new(&config.graphql, Some("token".to_string()), &config.feed, cache).unwrap();
        assert!(authed.is_authenticated());
    }
}
