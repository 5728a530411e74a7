use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// The only artifact major version this build can evaluate.
pub const SUPPORTED_ARTIFACT_MAJOR_VERSION: u64 = 1;

/// Global mbox name used when the artifact does not name one.
pub const DEFAULT_GLOBAL_MBOX: &str = "target-global-mbox";

/// Versioned, immutable rule bundle.
///
/// Created by a successful fetch and replaced wholesale on every update.
/// Nothing mutates an artifact once it has been published.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisioningArtifact {
    #[serde(deserialize_with = "string_or_number")]
    pub version: String,
    #[serde(default)]
    pub meta: ArtifactMeta,
    #[serde(default)]
    pub rules: ArtifactRules,
}

impl DecisioningArtifact {
    /// Rules for an mbox, in artifact order.
    pub fn mbox_rules(&self, name: &str) -> &[Rule] {
        self.rules.mboxes.get(name).map_or(&[], Vec::as_slice)
    }

    /// Rules for a view, in artifact order.
    pub fn view_rules(&self, name: &str) -> &[Rule] {
        self.rules.views.get(name).map_or(&[], Vec::as_slice)
    }

    /// Rules evaluated for page-load requests.
    pub fn global_mbox_rules(&self) -> &[Rule] {
        self.mbox_rules(&self.meta.global_mbox)
    }

    pub fn is_remote_mbox(&self, name: &str) -> bool {
        self.meta.remote_mboxes.iter().any(|m| m == name)
    }

    pub fn is_remote_view(&self, name: &str) -> bool {
        self.meta.remote_views.iter().any(|v| v == name)
    }

    /// Leading integer of the dot-separated version, if any.
    pub fn major_version(&self) -> Option<u64> {
        major_version(&self.version)
    }

    pub fn is_supported(&self) -> bool {
        match_major_version(&self.version, SUPPORTED_ARTIFACT_MAJOR_VERSION)
    }
}

/// Generation metadata carried alongside the rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtifactMeta {
    pub generated_at: String,
    pub organization_id: String,
    pub workspace: Option<i64>,
    pub environment: String,
    pub remote_mboxes: Vec<String>,
    pub remote_views: Vec<String>,
    pub global_mbox: String,
}

impl Default for ArtifactMeta {
    fn default() -> Self {
        Self {
            generated_at: String::new(),
            organization_id: String::new(),
            workspace: None,
            environment: String::new(),
            remote_mboxes: Vec::new(),
            remote_views: Vec::new(),
            global_mbox: DEFAULT_GLOBAL_MBOX.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactRules {
    pub mboxes: BTreeMap<String, Vec<Rule>>,
    pub views: BTreeMap<String, Vec<Rule>>,
}

/// A condition tree plus the payload emitted when it matches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub condition: serde_json::Value,
    #[serde(default)]
    pub consequence: Consequence,
    pub meta: RuleMeta,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMeta {
    pub activity_id: i64,
    pub experience_id: i64,
    #[serde(rename = "type", default)]
    pub rule_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mbox: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

/// Response payload of a matched rule, shaped like a remote mbox response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Consequence {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OfferOption>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Metric>,
}

impl Consequence {
    /// Event tokens of every option, in option order.
    pub fn event_tokens(&self) -> Vec<String> {
        self.options
            .iter()
            .filter_map(|o| o.event_token.clone())
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfferOption {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub option_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_tokens: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metric {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub metric_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_token: Option<String>,
}

/// Leading integer of a dot-separated version string.
pub fn major_version(version: &str) -> Option<u64> {
    version.trim().split('.').next()?.parse().ok()
}

/// Major-version-only comparison. An unparseable version never matches.
pub fn match_major_version(version: &str, supported_major: u64) -> bool {
    major_version(version) == Some(supported_major)
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "artifact version must be a string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_artifact_gets_defaults() {
        let artifact: DecisioningArtifact = serde_json::from_value(json!({
            "version": "1",
            "rules": {
                "mboxes": {
                    "mbox-something": [{
                        "condition": {},
                        "consequence": {"options": [{"type": "json", "content": {"a": 1}}]},
                        "meta": {"activityId": 1, "experienceId": 1, "type": "ab"}
                    }]
                }
            }
        }))
        .unwrap();

        assert_eq!(artifact.version, "1");
        assert_eq!(artifact.meta.global_mbox, DEFAULT_GLOBAL_MBOX);
        assert!(artifact.rules.views.is_empty());
        assert_eq!(artifact.mbox_rules("mbox-something").len(), 1);
        assert!(artifact.mbox_rules("unknown").is_empty());
        assert_eq!(artifact.mbox_rules("mbox-something")[0].meta.rule_type, "ab");
    }

    #[test]
    fn numeric_version_is_accepted() {
        let artifact: DecisioningArtifact =
            serde_json::from_value(json!({"version": 7, "rules": {}})).unwrap();
        assert_eq!(artifact.version, "7");
    }

    #[test]
    fn boolean_version_is_rejected() {
        let result = serde_json::from_value::<DecisioningArtifact>(json!({"version": true}));
        assert!(result.is_err());
    }

    #[test]
    fn major_version_matching() {
        assert!(match_major_version("1", 1));
        assert!(match_major_version("1.0.0", 1));
        assert!(match_major_version(" 1.2 ", 1));
        assert!(!match_major_version("99", 1));
        assert!(!match_major_version("2.0", 1));
        assert!(!match_major_version("v1", 1));
        assert!(!match_major_version("", 1));
    }

    #[test]
    fn remote_flags() {
        let artifact: DecisioningArtifact = serde_json::from_value(json!({
            "version": "1.0.0",
            "meta": {"remoteMboxes": ["remote-box"], "remoteViews": ["remote-view"]}
        }))
        .unwrap();
        assert!(artifact.is_remote_mbox("remote-box"));
        assert!(!artifact.is_remote_mbox("local-box"));
        assert!(artifact.is_remote_view("remote-view"));
        assert!(artifact.is_supported());
    }

    #[test]
    fn event_tokens_skip_missing() {
        let consequence = Consequence {
            name: None,
            options: vec![
                OfferOption {
                    event_token: Some("tok-1".into()),
                    ..Default::default()
                },
                OfferOption::default(),
            ],
            metrics: Vec::new(),
        };
        assert_eq!(consequence.event_tokens(), vec!["tok-1".to_string()]);
    }
}
