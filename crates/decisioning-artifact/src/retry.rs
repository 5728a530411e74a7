use std::time::Duration;

use tracing::{error, warn};

use decisioning_core::{DecisioningArtifact, FetchError};

use crate::fetcher::{ArtifactFetcher, FetchOutcome};

/// Backoff policy for the first artifact fetch.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt + 1`: `base * 2^attempt`, capped,
    /// then spread by +/- `jitter_factor`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp_delay =
            self.base_delay.as_millis() as f64 * 2.0_f64.powi(attempt.min(31) as i32);
        let capped = exp_delay.min(self.max_delay.as_millis() as f64);

        let jitter_range = capped * self.jitter_factor.clamp(0.0, 1.0);
        let jitter = (random_u64() % (jitter_range as u64 * 2 + 1)) as f64 - jitter_range;
        let final_ms = (capped + jitter).max(0.0);

        Duration::from_millis(final_ms as u64)
    }
}

/// Simple non-cryptographic random u64 using thread-local state.
fn random_u64() -> u64 {
    use std::cell::Cell;
    use std::time::SystemTime;

    thread_local! {
        static STATE: Cell<u64> = Cell::new(
            SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64
                | 1
        );
    }

    STATE.with(|s| {
        // xorshift64
        let mut x = s.get();
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        s.set(x);
        x
    })
}

/// Fetch the first artifact, retrying failures with backoff.
///
/// Makes at most `1 + max_retries` attempts. A `304` without a cached
/// artifact is treated as a failed attempt.
pub async fn fetch_with_retry(
    fetcher: &dyn ArtifactFetcher,
    location: &str,
    config: &RetryConfig,
) -> Result<(DecisioningArtifact, Option<String>), FetchError> {
    let mut last_error = FetchError::Network("no attempt made".into());

    for attempt in 0..=config.max_retries {
        let err = match fetcher.fetch(location, None).await {
            Ok(FetchOutcome::Updated { artifact, etag }) => return Ok((artifact, etag)),
            Ok(FetchOutcome::NotModified) => FetchError::Status {
                status: 304,
                body: "not modified without a cached artifact".into(),
            },
            Err(e) => e,
        };

        if !err.is_retryable() || attempt == config.max_retries {
            last_error = err;
            break;
        }

        let delay = config.delay_for(attempt);
        warn!(
            attempt = attempt + 1,
            max_retries = config.max_retries,
            delay_ms = delay.as_millis() as u64,
            error_kind = err.error_kind(),
            error = %err,
            "artifact fetch failed, retrying"
        );
        last_error = err;
        tokio::time::sleep(delay).await;
    }

    let exhausted = FetchError::Exhausted {
        retries: config.max_retries,
        last: last_error.to_string(),
    };
    error!(location, error = %exhausted, "giving up on first artifact fetch");
    Err(exhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockFetcher, MockResponse};

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn delay_grows_and_caps() {
        let config = fast_retry(5);
        assert_eq!(config.delay_for(0), Duration::from_millis(10));
        assert_eq!(config.delay_for(1), Duration::from_millis(20));
        assert_eq!(config.delay_for(3), Duration::from_millis(80));
        assert_eq!(config.delay_for(4), Duration::from_millis(100));
        assert_eq!(config.delay_for(40), Duration::from_millis(100));
    }

    #[test]
    fn jitter_stays_in_range() {
        let config = RetryConfig {
            jitter_factor: 0.2,
            ..fast_retry(3)
        };
        for _ in 0..100 {
            let d = config.delay_for(2).as_millis();
            assert!((32..=48).contains(&d), "delay {d} out of range");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let mock = MockFetcher::new(vec![
            MockResponse::Error(FetchError::Network("refused".into())),
            MockResponse::Error(FetchError::from_status(503, String::new())),
            MockResponse::version("1.0.0"),
        ]);

        let (artifact, _) = fetch_with_retry(&mock, "mock://rules", &fast_retry(3))
            .await
            .unwrap();
        assert_eq!(artifact.version, "1.0.0");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_retries() {
        let mock = MockFetcher::new(
            (0..5)
                .map(|_| MockResponse::Error(FetchError::Network("refused".into())))
                .collect(),
        );

        let err = fetch_with_retry(&mock, "mock://rules", &fast_retry(2))
            .await
            .unwrap_err();
        assert_eq!(mock.call_count(), 3);
        assert_eq!(
            err.to_string(),
            "Unable to retrieve artifact after 2 retries: network error: refused"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_single_attempt() {
        let mock = MockFetcher::new(vec![
            MockResponse::Error(FetchError::Decode("eof".into())),
            MockResponse::version("1"),
        ]);

        let err = fetch_with_retry(&mock, "mock://rules", &fast_retry(0))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Exhausted { retries: 0, .. }));
        assert_eq!(mock.call_count(), 1);
    }
}
