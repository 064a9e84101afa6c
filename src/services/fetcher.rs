// src/services/fetcher.rs

//! Fetch capability for wiki pages.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};

use crate::error::{FetchError, Result};
use crate::models::FetcherConfig;

/// A page body as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub body: String,
    /// `ETag` response header, when the server sent one
    pub etag: Option<String>,
}

/// Outcome of a (possibly conditional) fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fresh(FetchedPage),
    /// The server confirmed the validator passed in is still current
    NotModified,
}

/// Something that can retrieve a page by URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`. When `etag` is given the request is conditional and may
    /// answer [`FetchOutcome::NotModified`].
    async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
    ) -> std::result::Result<FetchOutcome, FetchError>;
}

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a configured asynchronous HTTP client.
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
    ) -> std::result::Result<FetchOutcome, FetchError> {
        let mut request = self.client.get(url);
        if let Some(etag) = etag {
            request = request.header(header::IF_NONE_MATCH, etag);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        log::debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(FetchOutcome::Fresh(FetchedPage { body, etag }))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_http_fetcher_builds_from_config() {
        assert!(HttpFetcher::new(&FetcherConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_scripted_fetcher_reports_status() {
        let fetcher = ScriptedFetcher::new().page("https://wiki.example/a", "<html></html>");
        assert!(matches!(
            fetcher.fetch("https://wiki.example/a", None).await,
            Ok(FetchOutcome::Fresh(_))
        ));
        assert_eq!(
            fetcher.fetch("https://wiki.example/b", None).await,
            Err(FetchError::Status {
                url: "https://wiki.example/b".into(),
                status: 404
            })
        );
        assert_eq!(fetcher.calls(), 2);
    }
}
