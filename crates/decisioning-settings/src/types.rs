//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` to match the option
//! names callers already pass to the client. Every section is
//! `#[serde(default)]` so a partial JSON file is valid.

use decisioning_core::messages;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings for a local decisioning engine.
///
/// ```json
/// {
///   "client": "acmeclient",
///   "organizationId": "ABC123@AdobeOrg",
///   "pollingInterval": 60000
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecisioningSettings {
    /// Client code, required.
    pub client: String,
    /// Organization id, required.
    pub organization_id: String,
    /// Artifact polling interval in ms. `0` disables polling.
    pub polling_interval: u64,
    /// Floor applied to non-zero polling intervals, in ms.
    pub minimum_polling_interval: u64,
    /// Fully qualified artifact URL. Derived from `cdnBase` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_location: Option<String>,
    /// Pre-fetched artifact; no network call is made for the first artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_payload: Option<serde_json::Value>,
    pub cdn_base: String,
    pub environment: String,
    /// Locale used when a request does not carry one.
    pub default_locale: String,
    pub retry: RetrySettings,
    pub http: HttpSettings,
    pub notifications: NotificationSettings,
    pub logging: LoggingSettings,
}

impl Default for DecisioningSettings {
    fn default() -> Self {
        Self {
            client: String::new(),
            organization_id: String::new(),
            polling_interval: 30_000,
            minimum_polling_interval: 10_000,
            artifact_location: None,
            artifact_payload: None,
            cdn_base: "https://assets.adobetarget.com".to_string(),
            environment: "production".to_string(),
            default_locale: "en".to_string(),
            retry: RetrySettings::default(),
            http: HttpSettings::default(),
            notifications: NotificationSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl DecisioningSettings {
    /// Check the options every engine needs.
    pub fn validate(&self) -> Result<()> {
        if self.client.trim().is_empty() {
            return Err(SettingsError::Required(messages::CLIENT_REQUIRED));
        }
        if self.organization_id.trim().is_empty() {
            return Err(SettingsError::Required(messages::ORG_ID_REQUIRED));
        }
        Ok(())
    }

    /// Where the artifact is fetched from, if anywhere.
    ///
    /// An explicit location always wins. A payload without a location means
    /// no network fetch. Otherwise the CDN location is derived from client
    /// and environment.
    pub fn resolved_artifact_location(&self) -> Option<String> {
        if let Some(location) = &self.artifact_location {
            return Some(location.clone());
        }
        if self.artifact_payload.is_some() {
            return None;
        }
        Some(format!(
            "{}/{}/{}/v1/rules.json",
            self.cdn_base.trim_end_matches('/'),
            self.client,
            self.environment
        ))
    }
}

/// Backoff for the first artifact fetch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_factor: 0.2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpSettings {
    pub timeout_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

/// Delivery of queued notification batches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    /// Per-batch send timeout in ms.
    pub timeout_ms: u64,
    /// Concurrent batch sends.
    pub max_in_flight: usize,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_in_flight: 32,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Per-module level overrides, e.g. `{"decisioning_artifact": "debug"}`.
    pub module_levels: std::collections::BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            module_levels: std::collections::BTreeMap::new(),
        }
    }
}
