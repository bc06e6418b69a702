// src/services/geo.rs

//! Best-effort IP geolocation.
//!
//! Lookups never fail: every error degrades to an empty [`GeoInfo`].

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

/// Upper bound on a single lookup.
pub const GEO_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoInfo {
    pub country: Option<String>,
    pub city: Option<String>,
}

#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self, ip: Option<&str>) -> GeoInfo;
}

/// Addresses that are never sent to the remote service.
pub fn is_local_or_private(ip: &str) -> bool {
    if ip == "127.0.0.1" || ip == "::1" || ip.starts_with("192.168.") {
        return true;
    }

    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => v4.is_loopback() || v4.is_private(),
        Ok(IpAddr::V6(v6)) => v6.is_loopback(),
        Err(_) => false,
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: Option<String>,
    country: Option<String>,
    city: Option<String>,
}

/// Looks addresses up through an ip-api.com style JSON endpoint.
///
/// The URL template contains an `{ip}` placeholder.
pub struct IpApiGeoResolver {
    client: reqwest::Client,
    url_template: String,
}

impl IpApiGeoResolver {
    pub fn new(url_template: &str) -> Result<Self, reqwest::Error> {
        Self::with_timeout(url_template, GEO_LOOKUP_TIMEOUT)
    }

    pub fn with_timeout(url_template: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url_template: url_template.to_string(),
        })
    }

    async fn fetch(&self, ip: &str) -> Result<GeoInfo, reqwest::Error> {
        let url = self.url_template.replace("{ip}", ip);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            tracing::warn!(ip, status = %response.status(), "Geo lookup failed");
            return Ok(GeoInfo::default());
        }

        let body: IpApiResponse = response.json().await?;
        if body.status.as_deref() == Some("fail") {
            tracing::debug!(ip, "Geo service could not resolve address");
            return Ok(GeoInfo::default());
        }

        Ok(GeoInfo {
            country: body.country.filter(|c| !c.is_empty()),
            city: body.city.filter(|c| !c.is_empty()),
        })
    }
}

#[async_trait]
impl GeoLookup for IpApiGeoResolver {
    async fn lookup(&self, ip: Option<&str>) -> GeoInfo {
        // Header values are client controlled; only real addresses reach the URL.
        let Some(addr) = ip.and_then(|ip| ip.trim().parse::<IpAddr>().ok()) else {
            return GeoInfo::default();
        };
        let ip = addr.to_string();
        if is_local_or_private(&ip) {
            return GeoInfo::default();
        }

        match self.fetch(&ip).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(ip = %ip, "Geo lookup error: {}", e);
                GeoInfo::default()
            }
        }
    }
}

/// Resolver that never leaves the process. Used when no geo service is
/// wanted and in tests.
pub struct NoopGeoResolver;

#[async_trait]
impl GeoLookup for NoopGeoResolver {
    async fn lookup(&self, _ip: Option<&str>) -> GeoInfo {
        GeoInfo::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{
        Json, Router, extract::Path, http::StatusCode, response::IntoResponse, routing::get,
    };
    use serde_json::json;

    async fn stub_geo(Path(ip): Path<String>) -> axum::response::Response {
        match ip.as_str() {
            "8.8.8.8" => Json(json!({
                "status": "success",
                "country": "United States",
                "city": "Mountain View",
            }))
            .into_response(),
            "1.1.1.1" => {
                Json(json!({ "status": "fail", "message": "reserved range" })).into_response()
            }
            "4.4.4.4" => {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({ "status": "success", "country": "Late" })).into_response()
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }

    async fn spawn_stub() -> String {
        let app = Router::new().route("/json/{ip}", get(stub_geo));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/json/{{ip}}", addr)
    }

    #[test]
    fn private_ranges_are_detected() {
        let private = [
            "127.0.0.1",
            "::1",
            "192.168.1.20",
            "10.0.0.7",
            "172.16.4.4",
            "172.31.255.1",
        ];
        for ip in private {
            assert!(is_local_or_private(ip), "{ip}");
        }
        for ip in ["8.8.8.8", "172.32.0.1", "2001:4860:4860::8888"] {
            assert!(!is_local_or_private(ip), "{ip}");
        }
    }

    #[tokio::test]
    async fn local_addresses_skip_the_network() {
        // Nothing listens on port 9; a network call would come back as an error.
        let resolver = IpApiGeoResolver::new("http://127.0.0.1:9/{ip}").unwrap();
        assert_eq!(resolver.lookup(None).await, GeoInfo::default());
        assert_eq!(resolver.lookup(Some("192.168.0.2")).await, GeoInfo::default());
    }

    #[tokio::test]
    async fn resolves_country_and_city() {
        let resolver = IpApiGeoResolver::new(&spawn_stub().await).unwrap();
        let info = resolver.lookup(Some("8.8.8.8")).await;
        assert_eq!(info.country.as_deref(), Some("United States"));
        assert_eq!(info.city.as_deref(), Some("Mountain View"));
    }

    #[tokio::test]
    async fn failures_degrade_to_empty() {
        let template = spawn_stub().await;
        let resolver =
            IpApiGeoResolver::with_timeout(&template, Duration::from_millis(200)).unwrap();

        // "fail" status, HTTP 500 and timeout.
        for ip in ["1.1.1.1", "9.9.9.9", "4.4.4.4"] {
            assert_eq!(resolver.lookup(Some(ip)).await, GeoInfo::default(), "{ip}");
        }
    }

    #[tokio::test]
    async fn malformed_addresses_never_reach_the_service() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().fallback(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Json(json!({ "status": "success", "country": "Nowhere" }))
            }
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let resolver = IpApiGeoResolver::new(&format!("http://{}/json/{{ip}}", addr)).unwrap();
        for ip in ["unknown", "a/../b?x=", "8.8.8.8/../admin", ""] {
            assert_eq!(resolver.lookup(Some(ip)).await, GeoInfo::default(), "{ip}");
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let info = resolver.lookup(Some(" 9.9.9.9 ")).await;
        assert_eq!(info.country.as_deref(), Some("Nowhere"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
