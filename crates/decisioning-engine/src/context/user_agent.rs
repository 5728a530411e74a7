//! Lightweight user-agent classification.
//!
//! Only the attributes rule conditions can target are extracted: browser
//! family, major version and operating system.

use std::sync::LazyLock;

use regex::Regex;

pub const UNKNOWN: &str = "unknown";

/// Ordered: more specific tokens (Edge, Opera) must win over the Chrome
/// token they also carry.
static BROWSERS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("edge", r"(?:Edge?|EdgA|EdgiOS)/(\d+)"),
        ("opera", r"(?:OPR|Opera)/(\d+)"),
        ("samsung browser", r"SamsungBrowser/(\d+)"),
        ("firefox", r"(?:Firefox|FxiOS)/(\d+)"),
        ("chrome", r"(?:Chrome|CriOS)/(\d+)"),
        ("safari", r"Version/(\d+)\S* (?:Mobile/\S+ )?Safari/"),
        ("ie", r"MSIE (\d+)|Trident/.*rv:(\d+)"),
    ]
    .into_iter()
    .filter_map(|(name, pattern)| Regex::new(pattern).ok().map(|re| (name, re)))
    .collect()
});

static PLATFORMS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("Windows", r"Windows"),
        ("iOS", r"iPhone|iPad|iPod"),
        ("Mac OS", r"Mac OS X|Macintosh"),
        ("Android", r"Android"),
        ("Chromium OS", r"CrOS"),
        ("Linux", r"Linux|X11"),
    ]
    .into_iter()
    .filter_map(|(name, pattern)| Regex::new(pattern).ok().map(|re| (name, re)))
    .collect()
});

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserAgentInfo {
    /// Lower-cased browser family.
    pub browser_type: String,
    pub platform: String,
    /// Major version, `-1` when unknown.
    pub browser_version: i64,
}

pub fn parse_user_agent(user_agent: Option<&str>) -> UserAgentInfo {
    let ua = user_agent.unwrap_or_default();

    let (browser_type, browser_version) = BROWSERS
        .iter()
        .find_map(|(name, re)| {
            let caps = re.captures(ua)?;
            let major = caps
                .iter()
                .skip(1)
                .flatten()
                .next()
                .and_then(|m| m.as_str().parse::<i64>().ok())
                .unwrap_or(-1);
            let family = if *name == "safari" && ua.contains("Mobile/") {
                "mobile safari"
            } else {
                name
            };
            Some((family.to_string(), major))
        })
        .unwrap_or_else(|| (UNKNOWN.to_string(), -1));

    let platform = PLATFORMS
        .iter()
        .find(|(_, re)| re.is_match(ua))
        .map_or(UNKNOWN, |(name, _)| name)
        .to_string();

    UserAgentInfo {
        browser_type,
        platform,
        browser_version,
    }
}
