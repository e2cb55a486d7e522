use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info};
use url::Url;

use crate::config::HttpConfig;

/// Network errors. Every variant is a fetch failure, never a parse failure.
#[derive(Error, Debug)]
pub enum RetrieverError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Timeout while fetching {0}")]
    Timeout(String),

    #[error("HTTP error {status}: failed to fetch {url}")]
    Status { status: u16, url: String },

    #[error("Empty response body from {0}")]
    EmptyBody(String),

    #[error("{0}")]
    Custom(String),
}

/// Fetches raw bytes from a URL.
#[async_trait]
pub trait ResourceRetriever: Send + Sync + std::fmt::Debug {
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, RetrieverError>;
}

/// [`ResourceRetriever`] backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpResourceRetriever {
    client: Client,
    request_timeout: Duration,
}

impl HttpResourceRetriever {
    pub fn new(config: &HttpConfig) -> Result<Self, RetrieverError> {
        let request_timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            request_timeout,
        })
    }
}

#[async_trait]
impl ResourceRetriever for HttpResourceRetriever {
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, RetrieverError> {
        debug!("Fetching resource from: {}", url);
        let _ = Url::parse(url)?;

        let response = match timeout(self.request_timeout, self.client.get(url).send()).await {
            Ok(result) => result?,
            Err(_) => return Err(RetrieverError::Timeout(url.to_string())),
        };

        if !response.status().is_success() {
            return Err(RetrieverError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?.to_vec();
        if body.is_empty() {
            return Err(RetrieverError::EmptyBody(url.to_string()));
        }

        info!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}
