use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use decisioning_core::artifact::{ArtifactMeta, ArtifactRules};
use decisioning_core::{DecisioningArtifact, FetchError};

use crate::fetcher::{ArtifactFetcher, FetchOutcome};

/// Pre-programmed responses for deterministic testing without a network.
#[derive(Clone, Debug)]
pub enum MockResponse {
    Artifact(DecisioningArtifact, Option<String>),
    NotModified,
    Error(FetchError),
    /// Wait a duration, then yield the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    /// An artifact with the given version and no rules.
    pub fn version(version: &str) -> Self {
        Self::Artifact(
            DecisioningArtifact {
                version: version.to_string(),
                meta: ArtifactMeta::default(),
                rules: ArtifactRules::default(),
            },
            None,
        )
    }

    pub fn artifact(artifact: DecisioningArtifact) -> Self {
        Self::Artifact(artifact, None)
    }

    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock fetcher that serves responses in sequence and records each request.
pub struct MockFetcher {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<(String, Option<String>)>>,
    call_count: AtomicUsize,
}

impl MockFetcher {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, response: MockResponse) {
        self.responses.lock().push_back(response);
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// `(location, etag)` for every call so far.
    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ArtifactFetcher for MockFetcher {
    async fn fetch(&self, location: &str, etag: Option<&str>) -> Result<FetchOutcome, FetchError> {
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .push((location.to_string(), etag.map(str::to_string)));

        let Some(mut current) = self.responses.lock().pop_front() else {
            return Err(FetchError::Network(format!(
                "MockFetcher: no response configured for call {idx}"
            )));
        };

        loop {
            match current {
                MockResponse::Artifact(artifact, etag) => {
                    return Ok(FetchOutcome::Updated { artifact, etag })
                }
                MockResponse::NotModified => return Ok(FetchOutcome::NotModified),
                MockResponse::Error(e) => return Err(e),
                MockResponse::Delay(duration, inner) => {
                    tokio::time::sleep(duration).await;
                    current = *inner;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_responses() {
        let mock = MockFetcher::new(vec![
            MockResponse::version("1"),
            MockResponse::Error(FetchError::Network("reset".into())),
        ]);

        let first = mock.fetch("mock://a", None).await.unwrap();
        assert!(matches!(first, FetchOutcome::Updated { ref artifact, .. } if artifact.version == "1"));
        assert!(mock.fetch("mock://a", Some("\"e\"")).await.is_err());
        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.requests()[1].1.as_deref(), Some("\"e\""));
    }

    #[tokio::test]
    async fn exhausted_sequence_errors() {
        let mock = MockFetcher::new(vec![]);
        let err = mock.fetch("mock://a", None).await.unwrap_err();
        assert!(err.to_string().contains("no response configured for call 0"));
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_response_waits() {
        let mock = MockFetcher::new(vec![MockResponse::delayed(
            Duration::from_secs(3),
            MockResponse::NotModified,
        )]);
        let start = tokio::time::Instant::now();
        let outcome = mock.fetch("mock://a", None).await.unwrap();
        assert_eq!(outcome, FetchOutcome::NotModified);
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
