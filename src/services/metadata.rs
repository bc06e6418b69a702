// src/services/metadata.rs

//! Link preview scraping.
//!
//! Fetches a page and pulls title, description, image, favicon and site
//! name out of its Open Graph / Twitter Card / plain HTML head with a set
//! of ordered regex fallbacks.

use std::sync::LazyLock;

use regex::{Captures, Regex, RegexBuilder};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use url::Url;

use crate::error::AppError;
use crate::models::metadata::PageMetadata;

pub const SCRAPER_USER_AGENT: &str = "Mozilla/5.0 (compatible; LinkedBot/1.0; +https://linked.app)";

/// Descriptions longer than this are cut and end with "...".
pub const MAX_DESCRIPTION_CHARS: usize = 300;

const MAX_REDIRECTS: usize = 10;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<title[^>]*>([^<]+)</title>").expect("valid title regex"));

static FAVICON_RES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        r#"(?i)<link[^>]*rel=["'](?:shortcut )?icon["'][^>]*href=["']([^"']+)["']"#,
        r#"(?i)<link[^>]*href=["']([^"']+)["'][^>]*rel=["'](?:shortcut )?icon["']"#,
        r#"(?i)<link[^>]*rel=["']apple-touch-icon["'][^>]*href=["']([^"']+)["']"#,
    ]
    .map(|p| Regex::new(p).expect("valid favicon regex"))
});

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&[#A-Za-z0-9_]+;").expect("valid entity regex"));

#[derive(Clone)]
pub struct MetadataClient {
    client: reqwest::Client,
}

impl MetadataClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .user_agent(SCRAPER_USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(Self { client })
    }

    /// Fetches `url` and extracts its metadata relative to the final,
    /// post-redirect address.
    pub async fn fetch(&self, url: &str) -> Result<PageMetadata, AppError> {
        let parsed = Url::parse(url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| AppError::BadRequest("Invalid URL format".to_string()))?;

        let response = self.client.get(parsed).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url, status = %status, "Metadata fetch failed");
            let message = format!(
                "Failed to fetch URL: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            );
            return Err(AppError::BadRequest(message.trim_end().to_string()));
        }

        let final_url = response.url().to_string();
        let html = response.text().await?;
        let metadata = extract_metadata(&html, &final_url);

        tracing::info!(
            url = %metadata.url,
            title = ?metadata.title,
            site_name = ?metadata.site_name,
            "Fetched metadata"
        );
        Ok(metadata)
    }
}

/// Builds the metadata for an already fetched page.
pub fn extract_metadata(html: &str, page_url: &str) -> PageMetadata {
    let description = extract_description(html)
        .map(|d| decode_html_entities(&d))
        .map(|d| truncate_description(&d));

    PageMetadata {
        url: page_url.to_string(),
        title: extract_title(html).map(|t| decode_html_entities(&t)),
        description,
        image_url: extract_image_url(html, page_url),
        favicon: Some(extract_favicon(html, page_url)),
        site_name: extract_site_name(html, page_url).map(|s| decode_html_entities(&s)),
    }
}

/// Content of the first `<meta>` whose `property` or `name` is `key`,
/// in either attribute order.
pub fn extract_meta_content(html: &str, key: &str) -> Option<String> {
    let key = regex::escape(key);
    let patterns = [
        format!(r#"<meta[^>]*property=["']{key}["'][^>]*content=["']([^"']+)["']"#),
        format!(r#"<meta[^>]*content=["']([^"']+)["'][^>]*property=["']{key}["']"#),
        format!(r#"<meta[^>]*name=["']{key}["'][^>]*content=["']([^"']+)["']"#),
        format!(r#"<meta[^>]*content=["']([^"']+)["'][^>]*name=["']{key}["']"#),
    ];

    patterns.iter().find_map(|pattern| {
        let re = RegexBuilder::new(pattern).case_insensitive(true).build().ok()?;
        re.captures(html).map(|c| c[1].to_string())
    })
}

fn first_meta(html: &str, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| extract_meta_content(html, key))
}

pub fn extract_title(html: &str) -> Option<String> {
    first_meta(html, &["og:title", "twitter:title"])
        .or_else(|| TITLE_RE.captures(html).map(|c| c[1].trim().to_string()))
}

pub fn extract_description(html: &str) -> Option<String> {
    first_meta(html, &["og:description", "twitter:description", "description"])
}

pub fn extract_image_url(html: &str, base_url: &str) -> Option<String> {
    first_meta(html, &["og:image", "twitter:image", "twitter:image:src"])
        .map(|image| resolve_url(&image, base_url))
}

/// Declared icon, or `/favicon.ico` on the page's origin.
pub fn extract_favicon(html: &str, base_url: &str) -> String {
    if let Some(href) = FAVICON_RES
        .iter()
        .find_map(|re| re.captures(html).map(|c| c[1].to_string()))
    {
        return resolve_url(&href, base_url);
    }

    Url::parse(base_url)
        .and_then(|base| base.join("/favicon.ico"))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| "/favicon.ico".to_string())
}

pub fn extract_site_name(html: &str, base_url: &str) -> Option<String> {
    first_meta(html, &["og:site_name", "application-name"]).or_else(|| {
        let url = Url::parse(base_url).ok()?;
        let host = url.host_str()?;
        Some(host.strip_prefix("www.").unwrap_or(host).to_string())
    })
}

/// Makes `url` absolute against `base_url`.
///
/// Absolute http(s) URLs pass through, protocol-relative ones take the
/// base scheme, anything else is joined onto the base. Unresolvable input
/// is returned unchanged.
pub fn resolve_url(url: &str, base_url: &str) -> String {
    if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }

    let base = Url::parse(base_url);

    if url.starts_with("//") {
        return match base {
            Ok(base) => format!("{}:{}", base.scheme(), url),
            Err(_) => format!("https:{}", url),
        };
    }

    base.and_then(|base| base.join(url))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

/// Decodes the common named entities and numeric character references.
/// Unknown entities are left as they are.
pub fn decode_html_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[0];
            decode_entity(entity).unwrap_or_else(|| entity.to_string())
        })
        .into_owned()
}

fn decode_entity(entity: &str) -> Option<String> {
    let named = match entity {
        "&amp;" => Some("&"),
        "&lt;" => Some("<"),
        "&gt;" => Some(">"),
        "&quot;" => Some("\""),
        "&#39;" | "&apos;" => Some("'"),
        "&nbsp;" => Some(" "),
        _ => None,
    };
    if let Some(s) = named {
        return Some(s.to_string());
    }

    let body = entity.strip_prefix("&#")?.strip_suffix(';')?;
    let code = match body.strip_prefix('x').or_else(|| body.strip_prefix('X')) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => body.parse::<u32>().ok()?,
    };
    char::from_u32(code).map(String::from)
}

fn truncate_description(description: &str) -> String {
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        let cut: String = description.chars().take(MAX_DESCRIPTION_CHARS - 3).collect();
        format!("{}...", cut)
    } else {
        description.to_string()
    }
}
