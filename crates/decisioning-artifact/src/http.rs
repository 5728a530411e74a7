use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ETAG, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use decisioning_core::{DecisioningArtifact, FetchError};

use crate::fetcher::{ArtifactFetcher, FetchOutcome};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches artifacts over HTTP(S) with conditional requests.
pub struct HttpArtifactFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpArtifactFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    /// Use a caller-configured client (proxies, TLS roots, ...).
    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn map_send_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl ArtifactFetcher for HttpArtifactFetcher {
    #[instrument(skip(self, etag), fields(location = %location))]
    async fn fetch(&self, location: &str, etag: Option<&str>) -> Result<FetchOutcome, FetchError> {
        let mut req = self.client.get(location).header(ACCEPT, "application/json");
        if let Some(etag) = etag {
            req = req.header(IF_NONE_MATCH, etag);
        }

        let resp = req.send().await.map_err(|e| self.map_send_error(e))?;

        if resp.status() == StatusCode::NOT_MODIFIED {
            debug!("artifact not modified");
            return Ok(FetchOutcome::NotModified);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status, body));
        }

        let etag = resp
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.text().await.map_err(|e| self.map_send_error(e))?;
        let artifact: DecisioningArtifact =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        Ok(FetchOutcome::Updated { artifact, etag })
    }
}
