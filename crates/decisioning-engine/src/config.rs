use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use decisioning_artifact::{
    ArtifactFetcher, ArtifactStoreConfig, HttpArtifactFetcher, RetryConfig,
};
use decisioning_core::{DecisioningArtifact, FetchError};
use decisioning_settings::DecisioningSettings;

use crate::error::Result;
use crate::notifications::NotificationSender;

/// Everything needed to build a [`DecisioningEngine`](crate::DecisioningEngine).
///
/// File-expressible options live in `settings`; the transport and the
/// notification sender are injected at runtime.
#[derive(Clone)]
pub struct EngineConfig {
    pub settings: DecisioningSettings,
    /// Replaces the default HTTP fetcher.
    pub fetcher: Option<Arc<dyn ArtifactFetcher>>,
    /// Receives notification batches. Without one, batches are dropped.
    pub notification_sender: Option<Arc<dyn NotificationSender>>,
}

impl EngineConfig {
    pub fn new(client: impl Into<String>, organization_id: impl Into<String>) -> Self {
        Self::from_settings(DecisioningSettings {
            client: client.into(),
            organization_id: organization_id.into(),
            ..DecisioningSettings::default()
        })
    }

    pub fn from_settings(settings: DecisioningSettings) -> Self {
        Self {
            settings,
            fetcher: None,
            notification_sender: None,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_notification_sender(mut self, sender: Arc<dyn NotificationSender>) -> Self {
        self.notification_sender = Some(sender);
        self
    }

    pub fn with_artifact_location(mut self, location: impl Into<String>) -> Self {
        self.settings.artifact_location = Some(location.into());
        self
    }

    pub fn with_artifact_payload(mut self, payload: Value) -> Self {
        self.settings.artifact_payload = Some(payload);
        self
    }

    /// Polling interval in ms; `0` disables polling.
    pub fn with_polling_interval(mut self, interval_ms: u64) -> Self {
        self.settings.polling_interval = interval_ms;
        self
    }

    pub fn with_minimum_polling_interval(mut self, interval_ms: u64) -> Self {
        self.settings.minimum_polling_interval = interval_ms;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        Ok(())
    }

    pub(crate) fn retry_config(&self) -> RetryConfig {
        let retry = &self.settings.retry;
        RetryConfig {
            max_retries: retry.max_retries,
            base_delay: Duration::from_millis(retry.base_delay_ms),
            max_delay: Duration::from_millis(retry.max_delay_ms),
            jitter_factor: retry.jitter_factor,
        }
    }

    pub(crate) fn notification_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.notifications.timeout_ms)
    }

    /// Store configuration with the payload decoded and the transport chosen.
    pub(crate) fn store_config(&self) -> Result<ArtifactStoreConfig> {
        let payload = self
            .settings
            .artifact_payload
            .as_ref()
            .map(|value| {
                serde_json::from_value::<DecisioningArtifact>(value.clone())
                    .map_err(|e| FetchError::Decode(e.to_string()))
            })
            .transpose()?;

        let fetcher: Arc<dyn ArtifactFetcher> = match &self.fetcher {
            Some(fetcher) => Arc::clone(fetcher),
            None => Arc::new(HttpArtifactFetcher::new(Duration::from_millis(
                self.settings.http.timeout_ms,
            ))?),
        };

        Ok(ArtifactStoreConfig {
            location: self.settings.resolved_artifact_location(),
            payload,
            polling_interval: Duration::from_millis(self.settings.polling_interval),
            minimum_polling_interval: Duration::from_millis(
                self.settings.minimum_polling_interval,
            ),
            retry: self.retry_config(),
            fetcher,
        })
    }
}
