//! Best-effort delivery of notification batches.
//!
//! Each batch is sent on its own task, bounded by a semaphore and a per-send
//! timeout. Failures are logged and never reach the decision caller.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};

use decisioning_core::NotificationBatch;

/// Counts one outstanding send until dropped.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("notification send failed: {0}")]
pub struct SendError(pub String);

/// Receives notification batches produced by decision calls.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, batch: NotificationBatch) -> Result<(), SendError>;
}

/// Spawns sends in the background and tracks how many are outstanding.
pub struct NotificationDispatcher {
    sender: Option<Arc<dyn NotificationSender>>,
    permits: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        sender: Option<Arc<dyn NotificationSender>>,
        max_in_flight: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            sender,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            in_flight: Arc::new(AtomicUsize::new(0)),
            timeout,
        }
    }

    /// Queue a batch for delivery. Returns immediately.
    pub fn dispatch(&self, batch: NotificationBatch) {
        if batch.is_empty() {
            return;
        }
        let Some(sender) = self.sender.clone() else {
            debug!(
                request_id = %batch.request_id,
                count = batch.len(),
                "no notification sender configured, dropping batch"
            );
            return;
        };

        let permits = Arc::clone(&self.permits);
        let guard = InFlight::enter(&self.in_flight);
        let timeout = self.timeout;

        drop(tokio::spawn(async move {
            let _guard = guard;
            let _permit = permits.acquire().await;
            let request_id = batch.request_id.clone();
            let count = batch.len();
            // A panicking sender surfaces here as a `JoinError`.
            let send = tokio::spawn(async move { sender.send(batch).await });
            let abort = send.abort_handle();
            match tokio::time::timeout(timeout, send).await {
                Ok(Ok(Ok(()))) => debug!(%request_id, count, "notifications sent"),
                Ok(Ok(Err(e))) => warn!(%request_id, count, error = %e, "notification send failed"),
                Ok(Err(e)) => warn!(%request_id, count, error = %e, "notification sender panicked"),
                Err(_elapsed) => {
                    abort.abort();
                    warn!(
                        %request_id,
                        count,
                        timeout_ms = timeout.as_millis() as u64,
                        "notification send timed out"
                    );
                }
            }
        }));
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait for outstanding sends. Returns `false` if the timeout expired first.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            if self.in_flight() == 0 {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
