// src/handlers/profile.rs

use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::AppError,
    models::{link::PublicLink, user::PublicProfile},
    services::request_meta::extract_event_metadata,
    state::AppState,
};

/// Public profile page data. Username matching ignores case.
/// Each successful lookup is recorded as a profile view.
pub async fn get_public_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .db
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let links: Vec<PublicLink> = state
        .db
        .list_public_links_by_user(&user.id)
        .await?
        .into_iter()
        .map(PublicLink::from)
        .collect();

    let metadata = extract_event_metadata(&headers, state.geo.as_ref()).await;
    if let Err(e) = state.db.record_profile_view(&user.id, &metadata).await {
        tracing::error!(user_id = %user.id, "Failed to record profile view: {:?}", e);
    }

    Ok(Json(json!({
        "profile": PublicProfile::from(&user),
        "links": links,
    })))
}
