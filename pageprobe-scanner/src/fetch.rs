use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use reqwest::{Client, StatusCode};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// Downloads the page under analysis.
///
/// Redirects are followed by the client, only the final status matters and it
/// must be exactly `200 OK`. The response (and its body stream) is owned by
/// `fetch_inner`, so it is released on every exit path including cancellation.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.fetch_timeout)
            .connect_timeout(config.fetch_timeout / 2)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_keepalive(std::time::Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &Url, cancel: &CancellationToken) -> Result<Vec<u8>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ScanError::Cancelled),
            body = self.fetch_inner(url) => body,
        }
    }

    async fn fetch_inner(&self, url: &Url) -> Result<Vec<u8>> {
        debug!("Fetching {}", url);

        let start = Instant::now();
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ScanError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        debug!(
            "Fetched {} ({} bytes in {:?})",
            url,
            body.len(),
            start.elapsed()
        );

        Ok(body.to_vec())
    }
}
