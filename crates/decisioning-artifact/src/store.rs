//! Owns the current artifact: first fetch, background polling, atomic swap
//! and subscriber fan-out.
//!
//! The artifact lives in a single `RwLock<Option<Arc<_>>>` cell. Writers
//! replace the `Arc` wholesale; readers clone it and drop the lock, so a
//! decision always evaluates against one complete version however long it
//! runs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use decisioning_core::{messages, DecisioningArtifact, FetchError};

use crate::fetcher::{ArtifactFetcher, FetchOutcome};
use crate::retry::{fetch_with_retry, RetryConfig};

type Subscriber = Arc<dyn Fn(&Arc<DecisioningArtifact>) + Send + Sync>;

/// How the store obtains and refreshes its artifact.
#[derive(Clone)]
pub struct ArtifactStoreConfig {
    /// Where to fetch and poll. `None` disables the network entirely.
    pub location: Option<String>,
    /// Pre-fetched first artifact. Skips the first network fetch.
    pub payload: Option<DecisioningArtifact>,
    /// `Duration::ZERO` disables polling.
    pub polling_interval: Duration,
    /// Floor for non-zero polling intervals.
    pub minimum_polling_interval: Duration,
    pub retry: RetryConfig,
    pub fetcher: Arc<dyn ArtifactFetcher>,
}

impl ArtifactStoreConfig {
    /// Effective polling period, or `None` when the store should not poll.
    pub fn effective_polling_interval(&self) -> Option<Duration> {
        if self.location.is_none() || self.polling_interval.is_zero() {
            return None;
        }
        if self.polling_interval < self.minimum_polling_interval {
            warn!(
                configured_ms = self.polling_interval.as_millis() as u64,
                minimum_ms = self.minimum_polling_interval.as_millis() as u64,
                "polling interval below minimum, clamping"
            );
            return Some(self.minimum_polling_interval);
        }
        Some(self.polling_interval)
    }
}

struct Shared {
    artifact: RwLock<Option<Arc<DecisioningArtifact>>>,
    etag: Mutex<Option<String>>,
    subscribers: Mutex<Vec<(u64, Subscriber)>>,
    next_subscriber_id: AtomicU64,
}

impl Shared {
    fn publish(&self, artifact: DecisioningArtifact, etag: Option<String>) {
        let artifact = Arc::new(artifact);
        let previous = self.artifact.write().replace(Arc::clone(&artifact));
        *self.etag.lock() = etag;

        info!(
            version = %artifact.version,
            previous_version = previous.as_ref().map(|a| a.version.as_str()),
            "artifact updated"
        );

        // Snapshot so callbacks may subscribe or unsubscribe without deadlocking.
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, f)| Arc::clone(f))
            .collect();
        for subscriber in subscribers {
            subscriber(&artifact);
        }
    }
}

/// Handle returned by [`ArtifactStore::subscribe`].
pub struct Subscription {
    shared: Weak<Shared>,
    id: u64,
    active: AtomicBool,
}

impl Subscription {
    /// Stop receiving updates. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(shared) = self.shared.upgrade() {
            shared.subscribers.lock().retain(|(id, _)| *id != self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Single writer of the artifact cell.
pub struct ArtifactStore {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl ArtifactStore {
    /// Obtain the first artifact and start polling.
    ///
    /// Resolves once an artifact is held. Fails when the first fetch
    /// exhausts its retries.
    pub async fn initialize(config: ArtifactStoreConfig) -> Result<Self, FetchError> {
        let (first, etag) = match (&config.payload, &config.location) {
            (Some(payload), _) => {
                debug!(version = %payload.version, "using supplied artifact payload");
                (payload.clone(), None)
            }
            (None, Some(location)) => {
                fetch_with_retry(config.fetcher.as_ref(), location, &config.retry).await?
            }
            (None, None) => {
                return Err(FetchError::Network(
                    "no artifact location or payload configured".into(),
                ))
            }
        };

        let shared = Arc::new(Shared {
            artifact: RwLock::new(None),
            etag: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(0),
        });
        shared.publish(first, etag);

        let cancel = CancellationToken::new();
        let poll_task = match (config.effective_polling_interval(), config.location.clone()) {
            (Some(interval), Some(location)) => {
                info!(%location, interval_ms = interval.as_millis() as u64, "artifact polling started");
                Some(tokio::spawn(poll_loop(
                    Arc::clone(&shared),
                    Arc::clone(&config.fetcher),
                    location,
                    interval,
                    cancel.clone(),
                )))
            }
            _ => {
                debug!("artifact polling disabled");
                None
            }
        };

        Ok(Self {
            shared,
            cancel,
            poll_task: Mutex::new(poll_task),
        })
    }

    /// Current artifact snapshot.
    pub fn artifact(&self) -> Option<Arc<DecisioningArtifact>> {
        self.shared.artifact.read().clone()
    }

    /// Register a callback invoked with every newly published artifact,
    /// in registration order.
    pub fn subscribe<F>(&self, f: F) -> Subscription
    where
        F: Fn(&Arc<DecisioningArtifact>) + Send + Sync + 'static,
    {
        let id = self.shared.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        self.shared.subscribers.lock().push((id, Arc::new(f)));
        Subscription {
            shared: Arc::downgrade(&self.shared),
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Cancel future polls. Idempotent; keeps the last artifact.
    pub fn stop_polling(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        // Detach: an in-flight fetch finishes on its own and is discarded.
        if self.poll_task.lock().take().is_some() {
            info!("artifact polling stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        !self.cancel.is_cancelled() && self.poll_task.lock().is_some()
    }
}

impl Drop for ArtifactStore {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_loop(
    shared: Arc<Shared>,
    fetcher: Arc<dyn ArtifactFetcher>,
    location: String,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }

        let etag = shared.etag.lock().clone();
        let result = fetcher.fetch(&location, etag.as_deref()).await;
        if cancel.is_cancelled() {
            debug!("discarding artifact fetched after polling stopped");
            break;
        }

        match result {
            Ok(FetchOutcome::Updated { artifact, etag }) => shared.publish(artifact, etag),
            Ok(FetchOutcome::NotModified) => debug!("artifact unchanged"),
            Err(e) => warn!(
                error_kind = e.error_kind(),
                "{}",
                messages::artifact_fetch_error(&e.to_string())
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockFetcher, MockResponse};

    fn config(fetcher: Arc<MockFetcher>, polling_ms: u64) -> ArtifactStoreConfig {
        ArtifactStoreConfig {
            location: Some("mock://rules.json".into()),
            payload: None,
            polling_interval: Duration::from_millis(polling_ms),
            minimum_polling_interval: Duration::ZERO,
            retry: RetryConfig {
                max_retries: 2,
                base_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(50),
                jitter_factor: 0.0,
            },
            fetcher,
        }
    }

    fn versions(n: usize) -> Vec<MockResponse> {
        (1..=n).map(|i| MockResponse::version(&i.to_string())).collect()
    }

    fn current_version(store: &ArtifactStore) -> String {
        store.artifact().map(|a| a.version.clone()).unwrap_or_default()
    }

    #[tokio::test(start_paused = true)]
    async fn polling_catches_up_monotonically() {
        let mock = Arc::new(MockFetcher::new(versions(10)));
        let store = ArtifactStore::initialize(config(mock.clone(), 5)).await.unwrap();
        assert_eq!(current_version(&store), "1");

        // Sample between polls: polls land at 5k ms, checks at 5k + 2 ms.
        tokio::time::sleep(Duration::from_millis(2)).await;
        for k in 1..=6u64 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let version = current_version(&store);
            assert_eq!(version, mock.call_count().to_string());
            assert_eq!(version, (k + 1).to_string());
        }
        store.stop_polling();
    }

    #[tokio::test(start_paused = true)]
    async fn poll_errors_keep_previous_artifact() {
        let mock = Arc::new(MockFetcher::new(vec![
            MockResponse::version("1"),
            MockResponse::Error(FetchError::from_status(500, "boom".into())),
            MockResponse::version("2"),
        ]));
        let store = ArtifactStore::initialize(config(mock.clone(), 100)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(mock.call_count(), 2);
        assert_eq!(current_version(&store), "1");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(current_version(&store), "2");
        assert!(store.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn first_fetch_retries_then_fails() {
        let mock = Arc::new(MockFetcher::new(vec![
            MockResponse::Error(FetchError::Network("refused".into())),
            MockResponse::Error(FetchError::Network("refused".into())),
            MockResponse::Error(FetchError::Network("refused".into())),
        ]));
        let err = ArtifactStore::initialize(config(mock.clone(), 0))
            .await
            .err()
            .unwrap();
        assert_eq!(mock.call_count(), 3);
        assert!(matches!(err, FetchError::Exhausted { retries: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn payload_without_location_never_fetches() {
        let mock = Arc::new(MockFetcher::new(versions(3)));
        let mut cfg = config(mock.clone(), 5);
        cfg.location = None;
        cfg.payload = Some(DecisioningArtifact {
            version: "1.2.0".into(),
            meta: Default::default(),
            rules: Default::default(),
        });

        let store = ArtifactStore::initialize(cfg).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(current_version(&store), "1.2.0");
        assert_eq!(mock.call_count(), 0);
        assert!(!store.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_disables_polling() {
        let mock = Arc::new(MockFetcher::new(versions(3)));
        let store = ArtifactStore::initialize(config(mock.clone(), 0)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(mock.call_count(), 1);
        assert!(!store.is_polling());
    }

    #[test]
    fn interval_below_floor_is_clamped() {
        let mock = Arc::new(MockFetcher::new(vec![]));
        let mut cfg = config(mock, 500);
        cfg.minimum_polling_interval = Duration::from_secs(10);
        assert_eq!(
            cfg.effective_polling_interval(),
            Some(Duration::from_secs(10))
        );
        cfg.polling_interval = Duration::from_secs(60);
        assert_eq!(
            cfg.effective_polling_interval(),
            Some(Duration::from_secs(60))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_polling_is_idempotent_and_keeps_artifact() {
        let mock = Arc::new(MockFetcher::new(versions(10)));
        let store = ArtifactStore::initialize(config(mock.clone(), 5)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(6)).await;
        assert_eq!(current_version(&store), "2");

        store.stop_polling();
        store.stop_polling();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(current_version(&store), "2");
        assert_eq!(mock.call_count(), 2);
        assert!(!store.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_completing_after_stop_is_discarded() {
        let mock = Arc::new(MockFetcher::new(vec![
            MockResponse::version("1"),
            MockResponse::delayed(Duration::from_millis(20), MockResponse::version("2")),
        ]));
        let store = ArtifactStore::initialize(config(mock.clone(), 5)).await.unwrap();

        // Poll fires at 5ms and is in flight until 25ms.
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.stop_polling();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(mock.call_count(), 2);
        assert_eq!(current_version(&store), "1");
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_run_in_order_and_unsubscribe_is_idempotent() {
        let mock = Arc::new(MockFetcher::new(versions(3)));
        let store = ArtifactStore::initialize(config(mock.clone(), 5)).await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s1 = {
            let seen = Arc::clone(&seen);
            store.subscribe(move |a| seen.lock().push(format!("a:{}", a.version)))
        };
        let _s2 = {
            let seen = Arc::clone(&seen);
            store.subscribe(move |a| seen.lock().push(format!("b:{}", a.version)))
        };

        tokio::time::sleep(Duration::from_millis(6)).await;
        assert_eq!(*seen.lock(), vec!["a:2", "b:2"]);

        s1.unsubscribe();
        s1.unsubscribe();
        assert!(!s1.is_active());

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(*seen.lock(), vec!["a:2", "b:2", "b:3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn etag_is_sent_and_304_does_not_notify() {
        let mock = Arc::new(MockFetcher::new(vec![
            MockResponse::Artifact(
                DecisioningArtifact {
                    version: "1".into(),
                    meta: Default::default(),
                    rules: Default::default(),
                },
                Some("\"v1\"".into()),
            ),
            MockResponse::NotModified,
        ]));
        let store = ArtifactStore::initialize(config(mock.clone(), 5)).await.unwrap();
        let calls = Arc::new(AtomicU64::new(0));
        let _sub = {
            let calls = Arc::clone(&calls);
            store.subscribe(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        tokio::time::sleep(Duration::from_millis(6)).await;
        assert_eq!(mock.requests()[1].1.as_deref(), Some("\"v1\""));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(current_version(&store), "1");
    }
}
