// src/models/metadata.rs

use serde::{Deserialize, Serialize};

/// Metadata scraped from a remote page, used to pre-fill a new link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    /// Final URL after redirects.
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub favicon: Option<String>,
    pub site_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FetchMetadataRequest {
    pub url: Option<String>,
}
