// src/services/request_meta.rs

use axum::http::HeaderMap;
use url::Url;

use super::geo::GeoLookup;
use super::user_agent::parse_user_agent;
use crate::models::analytics::EventMetadata;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Client address as reported by the proxy in front of us:
/// `cf-connecting-ip`, then the first `x-forwarded-for` hop, then `x-real-ip`.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(ip) = header(headers, "cf-connecting-ip") {
        return Some(ip.to_string());
    }

    if let Some(forwarded) = header(headers, "x-forwarded-for") {
        let first = forwarded.split(',').next().unwrap_or_default().trim();
        if !first.is_empty() {
            return Some(first.to_string());
        }
    }

    header(headers, "x-real-ip").map(String::from)
}

/// Host of a referrer URL without a leading "www.".
pub fn referrer_domain(referrer: Option<&str>) -> Option<String> {
    let url = Url::parse(referrer?).ok()?;
    let host = url.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Everything recorded alongside a click or a profile view.
pub async fn extract_event_metadata(headers: &HeaderMap, geo: &dyn GeoLookup) -> EventMetadata {
    let ip_address = client_ip(headers);
    let user_agent = header(headers, "user-agent").map(String::from);
    let referrer = header(headers, "referer")
        .or_else(|| header(headers, "referrer"))
        .map(String::from);

    let parsed = parse_user_agent(user_agent.as_deref());
    let location = geo.lookup(ip_address.as_deref()).await;
    let referrer_domain = referrer_domain(referrer.as_deref());

    EventMetadata {
        ip_address,
        country: location.country,
        city: location.city,
        user_agent,
        device_type: Some(parsed.device_type),
        browser: Some(parsed.browser),
        os: Some(parsed.os),
        referrer,
        referrer_domain,
    }
}
