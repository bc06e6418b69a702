// src/handlers/metadata.rs

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

use crate::{
    error::AppError, models::metadata::FetchMetadataRequest, services::metadata::MetadataClient,
};

/// Scrapes preview metadata for a URL the user is about to add.
pub async fn fetch_metadata(
    State(client): State<MetadataClient>,
    Json(payload): Json<FetchMetadataRequest>,
) -> Result<impl IntoResponse, AppError> {
    let url = payload
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("URL is required".to_string()))?;

    let metadata = client.fetch(url.trim()).await?;
    Ok(Json(json!({ "metadata": metadata })))
}
