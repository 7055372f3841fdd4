use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outbound HTTP boundary shared by the scrape and image stages. Tests swap
/// in map-backed fetchers so no stage touches the network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a page body as text. Non-2xx statuses are errors.
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// Fetch a binary body. Non-2xx statuses are errors.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// reqwest-backed [`Fetcher`]. One attempt per call, no retries.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}
