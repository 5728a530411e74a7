//! Context Builder: derives the matchable attributes a rule condition sees.
//!
//! A context is rebuilt for every request. Apart from the timing fields the
//! output is a pure function of the request.

mod address;
mod timing;
mod user_agent;

pub use self::address::UrlContext;
pub use self::timing::TimingContext;
pub use self::user_agent::{parse_user_agent, UserAgentInfo, UNKNOWN};

use serde_json::{json, Map, Value};
use tracing::debug;

use decisioning_core::delivery::{DeliveryContext, Parameters};
use decisioning_core::DeliveryRequest;

use crate::error::{EngineError, Result};

/// Browser attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserContext {
    pub browser_type: String,
    pub platform: String,
    pub locale: String,
    pub browser_version: i64,
}

impl UserContext {
    fn to_value(&self) -> Value {
        let mut map = Map::new();
        let _ = map.insert("browserType".into(), self.browser_type.clone().into());
        let _ = map.insert("platform".into(), self.platform.clone().into());
        let _ = map.insert("locale".into(), self.locale.clone().into());
        let _ = map.insert("browserVersion".into(), self.browser_version.into());
        Value::Object(with_lowercase(map))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisioningContext {
    pub timing: TimingContext,
    pub user: UserContext,
    pub page: UrlContext,
    pub referring: UrlContext,
}

impl DecisioningContext {
    /// JSON document handed to rule conditions for one target.
    ///
    /// Target parameters appear under `mbox`.
    pub fn rule_data(&self, parameters: &Parameters) -> Value {
        json!({
            "current_timestamp": self.timing.current_timestamp,
            "current_time": self.timing.current_time,
            "current_day": self.timing.current_day,
            "user": self.user.to_value(),
            "page": self.page.to_value(),
            "referring": self.referring.to_value(),
            "mbox": parameters_value(parameters),
        })
    }
}

/// Build the context for a request. Fails when the request has no `context`.
pub fn create_decisioning_context(
    request: &DeliveryRequest,
    default_locale: &str,
) -> Result<DecisioningContext> {
    let context = request.context.as_ref().ok_or(EngineError::ContextUndefined)?;
    let ua = parse_user_agent(context.user_agent.as_deref());
    let address = context.address.as_ref();

    Ok(DecisioningContext {
        timing: TimingContext::now(),
        user: UserContext {
            browser_type: ua.browser_type,
            platform: ua.platform,
            locale: resolve_locale(context, default_locale),
            browser_version: ua.browser_version,
        },
        page: UrlContext::parse(address.and_then(|a| a.url.as_deref())),
        referring: UrlContext::parse(address.and_then(|a| a.referring_url.as_deref())),
    })
}

/// Primary language subtag of the request locale, else the default.
fn resolve_locale(context: &DeliveryContext, default_locale: &str) -> String {
    let primary = context
        .locale
        .as_deref()
        .and_then(|raw| raw.split(',').next())
        .and_then(|tag| tag.split(';').next())
        .and_then(|tag| tag.trim().split(['-', '_']).next())
        .map(str::trim)
        .filter(|tag| !tag.is_empty() && *tag != "*");

    match primary {
        Some(tag) => tag.to_lowercase(),
        None => {
            debug!(default_locale, "request carries no locale, using default");
            default_locale.to_string()
        }
    }
}

fn parameters_value(parameters: &Parameters) -> Value {
    let map = parameters
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    Value::Object(with_lowercase(map))
}

/// Add a `{key}_lc` entry for every entry; string values are lower-cased.
pub(crate) fn with_lowercase(map: Map<String, Value>) -> Map<String, Value> {
    let mut out = map.clone();
    for (key, value) in map {
        let lowered = match value {
            Value::String(s) => Value::String(s.to_lowercase()),
            other => other,
        };
        let _ = out.insert(format!("{key}_lc"), lowered);
    }
    out
}
