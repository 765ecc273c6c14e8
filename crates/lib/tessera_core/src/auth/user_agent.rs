//! Coarse `User-Agent` classification.
//!
//! Sessions are compared by operating-system family and browser family only,
//! so a browser auto-updating between requests does not look like a new
//! device. Patterns are checked in order; the first hit wins.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OsFamily {
    Windows,
    MacOs,
    Ios,
    Android,
    ChromeOs,
    Linux,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrowserFamily {
    Edge,
    Opera,
    SamsungInternet,
    Chrome,
    Firefox,
    Safari,
    Other,
}

/// The parts of a user agent that identify a device for anomaly purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentFingerprint {
    pub os: OsFamily,
    pub browser: BrowserFamily,
}

// iOS and Android must precede macOS and Linux: their UAs mention both.
const OS_PATTERNS: &[(&str, OsFamily)] = &[
    ("iphone", OsFamily::Ios),
    ("ipad", OsFamily::Ios),
    ("ipod", OsFamily::Ios),
    ("android", OsFamily::Android),
    ("cros", OsFamily::ChromeOs),
    ("windows", OsFamily::Windows),
    ("mac os x", OsFamily::MacOs),
    ("macintosh", OsFamily::MacOs),
    ("linux", OsFamily::Linux),
];

// Chromium derivatives advertise "Chrome" and "Safari" too.
const BROWSER_PATTERNS: &[(&str, BrowserFamily)] = &[
    ("edg/", BrowserFamily::Edge),
    ("edge/", BrowserFamily::Edge),
    ("edgios/", BrowserFamily::Edge),
    ("edga/", BrowserFamily::Edge),
    ("opr/", BrowserFamily::Opera),
    ("opera", BrowserFamily::Opera),
    ("samsungbrowser/", BrowserFamily::SamsungInternet),
    ("crios/", BrowserFamily::Chrome),
    ("chrome/", BrowserFamily::Chrome),
    ("chromium/", BrowserFamily::Chrome),
    ("fxios/", BrowserFamily::Firefox),
    ("firefox/", BrowserFamily::Firefox),
    ("safari/", BrowserFamily::Safari),
];

pub fn parse_user_agent(user_agent: &str) -> AgentFingerprint {
    let ua = user_agent.to_ascii_lowercase();
    let os = OS_PATTERNS
        .iter()
        .find(|(needle, _)| ua.contains(needle))
        .map_or(OsFamily::Other, |(_, os)| *os);
    let browser = BROWSER_PATTERNS
        .iter()
        .find(|(needle, _)| ua.contains(needle))
        .map_or(BrowserFamily::Other, |(_, b)| *b);
    AgentFingerprint { os, browser }
}
