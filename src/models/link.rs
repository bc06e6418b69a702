// src/models/link.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'links' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub favicon: Option<String>,
    pub site_name: Option<String>,

    /// Display order among the owner's links.
    pub position: i64,
    pub is_public: bool,

    /// Denormalized counter bumped on every redirect.
    pub click_count: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Link as shown on a public profile.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicLink {
    pub id: String,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub favicon: Option<String>,
    pub site_name: Option<String>,
}

impl From<Link> for PublicLink {
    fn from(link: Link) -> Self {
        Self {
            id: link.id,
            url: link.url,
            title: link.title,
            description: link.description,
            image_url: link.image_url,
            favicon: link.favicon,
            site_name: link.site_name,
        }
    }
}

/// DTO for creating a new link.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "URL is required"))]
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub favicon: Option<String>,
    pub site_name: Option<String>,
    pub is_public: Option<bool>,
}

/// DTO for a partial link update.
///
/// For the nullable metadata fields `None` means "leave unchanged" and
/// `Some(None)` (an explicit JSON `null`) clears the column.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLinkRequest {
    pub url: Option<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub favicon: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub site_name: Option<Option<String>>,
    pub is_public: Option<bool>,
}

fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UpdateLinkRequest {
    /// Applies the present fields onto an existing link.
    pub fn apply_to(self, link: &mut Link) {
        if let Some(url) = self.url {
            link.url = url;
        }
        if let Some(title) = self.title {
            link.title = title;
        }
        if let Some(description) = self.description {
            link.description = description;
        }
        if let Some(image_url) = self.image_url {
            link.image_url = image_url;
        }
        if let Some(favicon) = self.favicon {
            link.favicon = favicon;
        }
        if let Some(site_name) = self.site_name {
            link.site_name = site_name;
        }
        if let Some(is_public) = self.is_public {
            link.is_public = is_public;
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderLinksRequest {
    pub link_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinkStats {
    pub total_links: i64,
    pub public_links: i64,
    pub total_clicks: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_distinguishes_missing_from_null() {
        let req: UpdateLinkRequest =
            serde_json::from_str(r#"{"title": null, "siteName": "Docs"}"#).unwrap();
        assert_eq!(req.title, Some(None));
        assert_eq!(req.site_name, Some(Some("Docs".to_string())));
        assert_eq!(req.description, None);
    }
}
