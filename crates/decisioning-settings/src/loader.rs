//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`DecisioningSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `DECISIONING_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::DecisioningSettings;

/// Resolve the settings file path.
///
/// `DECISIONING_SETTINGS_PATH` wins; otherwise `~/.decisioning/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(path) = read_env_string("DECISIONING_SETTINGS_PATH") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".decisioning").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<DecisioningSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<DecisioningSettings> {
    let defaults = serde_json::to_value(DecisioningSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value =
            serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: DecisioningSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_env_overrides(settings: &mut DecisioningSettings) {
    if let Some(v) = read_env_string("DECISIONING_CLIENT") {
        settings.client = v;
    }
    if let Some(v) = read_env_string("DECISIONING_ORGANIZATION_ID") {
        settings.organization_id = v;
    }
    if let Some(v) = read_env_u64("DECISIONING_POLLING_INTERVAL", 0, 86_400_000) {
        settings.polling_interval = v;
    }
    if let Some(v) = read_env_string("DECISIONING_ARTIFACT_LOCATION") {
        settings.artifact_location = Some(v);
    }
    if let Some(v) = read_env_string("DECISIONING_CDN_BASE") {
        settings.cdn_base = v;
    }
    if let Some(v) = read_env_string("DECISIONING_ENVIRONMENT") {
        settings.environment = v;
    }
    if let Some(v) = read_env_string("DECISIONING_DEFAULT_LOCALE") {
        settings.default_locale = v;
    }
    if let Some(v) = read_env_u32("DECISIONING_MAX_RETRIES", 0, 100) {
        settings.retry.max_retries = v;
    }
    if let Some(v) = read_env_u64("DECISIONING_HTTP_TIMEOUT_MS", 100, 600_000) {
        settings.http.timeout_ms = v;
    }
    if let Some(v) = read_env_string("DECISIONING_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("DECISIONING_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, min, max, "invalid integer env var, ignoring");
    }
    result
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    read_env_u64(name, u64::from(min), u64::from(max)).and_then(|v| u32::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_objects_recursively() {
        let target = json!({"retry": {"maxRetries": 10, "baseDelayMs": 1000}, "client": "a"});
        let source = json!({"retry": {"maxRetries": 2}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["retry"]["maxRetries"], 2);
        assert_eq!(merged["retry"]["baseDelayMs"], 1000);
        assert_eq!(merged["client"], "a");
    }

    #[test]
    fn deep_merge_skips_null_and_replaces_arrays() {
        let target = json!({"client": "a", "list": [1, 2, 3]});
        let source = json!({"client": null, "list": [9]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["client"], "a");
        assert_eq!(merged["list"], json!([9]));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings.environment, DecisioningSettings::default().environment);
        assert_eq!(settings.retry, DecisioningSettings::default().retry);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"client": "acme", "organizationId": "org@AdobeOrg", "http": {"timeoutMs": 2500}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.client, "acme");
        assert_eq!(settings.organization_id, "org@AdobeOrg");
        assert_eq!(settings.http.timeout_ms, 2500);
        assert_eq!(settings.notifications.max_in_flight, 32);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
        assert!(err.to_string().contains("settings.json"));
    }

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_u64_range_bounds() {
        assert_eq!(parse_u64_range("5000", 0, 10_000), Some(5000));
        assert_eq!(parse_u64_range(" 7 ", 0, 10), Some(7));
        assert_eq!(parse_u64_range("20000", 0, 10_000), None);
        assert_eq!(parse_u64_range("-1", 0, 10), None);
        assert_eq!(parse_u64_range("abc", 0, 10), None);
    }
}
