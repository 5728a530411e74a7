use serde_json::{Map, Value};
use url::Url;

/// Second-level labels that belong to a country-code TLD (`example.co.uk`).
const SECOND_LEVEL_LABELS: &[&str] = &["co", "com", "org", "net", "gov", "ac", "edu"];

/// Structural components of a page or referring URL.
///
/// Every field is a string; a missing or malformed URL yields all-empty
/// fields rather than an error.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UrlContext {
    pub url: String,
    pub scheme: String,
    /// Full host name.
    pub domain: String,
    /// Labels left of the registrable domain; empty for `www`.
    pub subdomain: String,
    pub top_level_domain: String,
    pub path: String,
    /// Raw query string, without `?`.
    pub query: String,
    /// Fragment, without `#`.
    pub fragment: String,
}

impl UrlContext {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::default();
        };
        let Ok(parsed) = Url::parse(raw) else {
            return Self::default();
        };

        let domain = parsed.host_str().unwrap_or_default().to_string();
        let (subdomain, top_level_domain) = split_host(&domain);

        Self {
            url: raw.to_string(),
            scheme: parsed.scheme().to_string(),
            domain,
            subdomain,
            top_level_domain,
            path: parsed.path().to_string(),
            query: parsed.query().unwrap_or_default().to_string(),
            fragment: parsed.fragment().unwrap_or_default().to_string(),
        }
    }

    /// Rule-facing attributes, each with its `_lc` duplicate.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for (key, value) in [
            ("url", &self.url),
            ("scheme", &self.scheme),
            ("domain", &self.domain),
            ("subdomain", &self.subdomain),
            ("topLevelDomain", &self.top_level_domain),
            ("path", &self.path),
            ("query", &self.query),
            ("fragment", &self.fragment),
        ] {
            let _ = map.insert(key.to_string(), Value::String(value.clone()));
        }
        Value::Object(super::with_lowercase(map))
    }
}

/// `(subdomain, topLevelDomain)` for a host name. IP literals have neither.
fn split_host(host: &str) -> (String, String) {
    if host.is_empty() || host.parse::<std::net::IpAddr>().is_ok() || host.starts_with('[') {
        return (String::new(), String::new());
    }
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return (String::new(), String::new());
    }

    let n = labels.len();
    let tld_labels = if n >= 3
        && labels[n - 1].len() == 2
        && SECOND_LEVEL_LABELS.contains(&labels[n - 2])
    {
        2
    } else {
        1
    };
    let top_level_domain = labels[n - tld_labels..].join(".");

    // Registrable domain is one label plus the TLD.
    let sub_labels = n.saturating_sub(tld_labels + 1);
    let subdomain = match labels[..sub_labels].join(".") {
        s if s == "www" => String::new(),
        s => s,
    };
    (subdomain, top_level_domain)
}
