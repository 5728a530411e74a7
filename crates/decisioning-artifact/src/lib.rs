//! Artifact Store: retrieves the decisioning artifact, keeps it fresh in the
//! background and hands out consistent snapshots.

pub mod fetcher;
pub mod http;
pub mod mock;
pub mod retry;
pub mod store;

pub use fetcher::{ArtifactFetcher, FetchOutcome};
pub use http::HttpArtifactFetcher;
pub use retry::{fetch_with_retry, RetryConfig};
pub use store::{ArtifactStore, ArtifactStoreConfig, Subscription};
