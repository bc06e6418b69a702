// src/services/user_agent.rs

//! Device, browser and OS classification from a raw user-agent header.

use woothee::parser::Parser;

use crate::models::analytics::DeviceType;

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUserAgent {
    pub device_type: DeviceType,
    pub browser: String,
    pub os: String,
}

/// Classifies a user agent.
///
/// An absent or empty header gives an `unknown` device, while a header that
/// is present but carries no mobile or tablet signal counts as `desktop`.
pub fn parse_user_agent(user_agent: Option<&str>) -> ParsedUserAgent {
    let ua = match user_agent.map(str::trim) {
        Some(ua) if !ua.is_empty() => ua,
        _ => {
            return ParsedUserAgent {
                device_type: DeviceType::Unknown,
                browser: UNKNOWN.to_string(),
                os: UNKNOWN.to_string(),
            };
        }
    };

    let result = Parser::new().parse(ua).unwrap_or_default();

    let is_tablet = ua.contains("iPad")
        || ua.contains("Tablet")
        || (ua.contains("Android") && !ua.contains("Mobile"))
        || result.os == "iPad";

    let device_type = if is_tablet {
        DeviceType::Tablet
    } else if matches!(result.category, "smartphone" | "mobilephone") {
        DeviceType::Mobile
    } else {
        DeviceType::Desktop
    };

    ParsedUserAgent {
        device_type,
        browser: known_or_unknown(result.name),
        os: known_or_unknown(result.os),
    }
}

fn known_or_unknown(value: &str) -> String {
    if value.is_empty() || value == "UNKNOWN" {
        UNKNOWN.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const SAFARI_IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const ANDROID_TABLET: &str = "Mozilla/5.0 (Linux; Android 13; SM-X700) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    #[test]
    fn desktop_browser() {
        let parsed = parse_user_agent(Some(CHROME_WINDOWS));
        assert_eq!(parsed.device_type, DeviceType::Desktop);
        assert_eq!(parsed.browser, "Chrome");
        assert_eq!(parsed.os, "Windows 10");
    }

    #[test]
    fn phone_and_tablets() {
        let phone = parse_user_agent(Some(SAFARI_IPHONE));
        assert_eq!(phone.device_type, DeviceType::Mobile);
        assert_eq!(phone.browser, "Safari");

        assert_eq!(parse_user_agent(Some(SAFARI_IPAD)).device_type, DeviceType::Tablet);
        assert_eq!(parse_user_agent(Some(ANDROID_TABLET)).device_type, DeviceType::Tablet);
    }

    #[test]
    fn absent_and_unparseable_agents_differ_in_device_type() {
        for missing in [None, Some(""), Some("   ")] {
            let parsed = parse_user_agent(missing);
            assert_eq!(parsed.device_type, DeviceType::Unknown);
            assert_eq!(parsed.browser, "Unknown");
            assert_eq!(parsed.os, "Unknown");
        }

        let garbage = parse_user_agent(Some("definitely-not-a-browser"));
        assert_eq!(garbage.device_type, DeviceType::Desktop);
        assert_eq!(garbage.browser, "Unknown");
        assert_eq!(garbage.os, "Unknown");
    }
}
