//! Plain byte downloads.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use tracing::debug;

use crate::backend::{FetchedBytes, Fetcher};
use crate::error::{truncate_body, ClientError};

/// Generic user agent; some image hosts reject requests without one.
const FETCH_USER_AGENT: &str = "Mozilla/5.0 (compatible; genrun/0.1)";

/// HTTP client for downloading reference images and generated outputs.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    inner: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedBytes, ClientError> {
        debug!(url = %url, "GET request");

        let response = self
            .inner
            .get(url)
            .header(USER_AGENT, FETCH_USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: truncate_body(&body, 256),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(normalize_content_type);

        let bytes = response.bytes().await?.to_vec();
        debug!(url = %url, bytes = bytes.len(), content_type = ?content_type, "Downloaded");

        Ok(FetchedBytes {
            bytes,
            content_type,
        })
    }
}

/// Strip parameters (`; charset=...`) and lowercase a Content-Type value.
fn normalize_content_type(raw: &str) -> Option<String> {
    let value = raw.split(';').next()?.trim().to_ascii_lowercase();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_content_type() {
        assert_eq!(
            normalize_content_type("Image/PNG; charset=binary"),
            Some("image/png".to_string())
        );
        assert_eq!(normalize_content_type("  "), None);
    }
}
