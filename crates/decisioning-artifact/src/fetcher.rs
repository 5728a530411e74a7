use async_trait::async_trait;

use decisioning_core::{DecisioningArtifact, FetchError};

/// Result of a single artifact request.
#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome {
    /// A complete artifact, with the validator to send on the next request.
    Updated {
        artifact: DecisioningArtifact,
        etag: Option<String>,
    },
    /// The server confirmed the cached artifact is still current.
    NotModified,
}

/// Pluggable transport for retrieving the decisioning artifact.
///
/// Implementations perform exactly one request per call; retry and polling
/// policy belong to the store.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, location: &str, etag: Option<&str>) -> Result<FetchOutcome, FetchError>;
}
