//! Response handling shared by both upstream clients.

use std::time::Duration;

use anyhow::Context;
use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::error::{parse_retry_after, CatalogError};

const USER_AGENT: &str = concat!("anime-catalog/", env!("CARGO_PKG_VERSION"));

/// HTTP client with the shared user agent and the given timeout
pub fn build_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to create HTTP client")
}

/// Error for a non-success status; 429 becomes [`CatalogError::RateLimited`]
pub fn status_error(status: StatusCode, headers: &HeaderMap, body: String) -> CatalogError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return CatalogError::RateLimited {
            retry_after: parse_retry_after(headers),
        };
    }
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        body
    };
    CatalogError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Decode a successful response body, mapping failures onto [`CatalogError`]
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, CatalogError> {
    let status = response.status();
    if !status.is_success() {
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, &headers, body));
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| CatalogError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, RETRY_AFTER};

    #[test]
    fn test_429_maps_to_rate_limited() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));

        let err = status_error(StatusCode::TOO_MANY_REQUESTS, &headers, String::new());
        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_other_status_maps_to_api_error() {
        let err = status_error(
            StatusCode::SERVICE_UNAVAILABLE,
            &HeaderMap::new(),
            "maintenance".to_string(),
        );
        match err {
            CatalogError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_body_uses_reason_phrase() {
        let err = status_error(StatusCode::NOT_FOUND, &HeaderMap::new(), "  ".to_string());
        assert!(err.to_string().contains("Not Found"));
    }

    #[test]
    fn test_build_client() {
        assert!(build_client(Duration::from_secs(5)).is_ok());
    }
}
