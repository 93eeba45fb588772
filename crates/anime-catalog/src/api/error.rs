use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use thiserror::Error;

/// Errors from the upstream catalog clients.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by upstream (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("request queue is closed")]
    QueueClosed,
}

impl CatalogError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CatalogError::RateLimited { .. })
    }

    /// Wait hint carried by a 429
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CatalogError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Transport, status and body failures get another attempt. A GraphQL
    /// validation error describes the request itself and repeats verbatim.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Http(_)
            | CatalogError::Api { .. }
            | CatalogError::RateLimited { .. }
            | CatalogError::Decode(_) => true,
            CatalogError::GraphQl(_) | CatalogError::QueueClosed => false,
        }
    }
}

/// Read a `retry-after` header given in (possibly fractional) seconds.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    let seconds = raw.parse::<f64>().ok()?;
    if seconds.is_finite() && seconds >= 0.0 {
        Some(Duration::from_secs_f64(seconds))
    } else {
        None
    }
}
