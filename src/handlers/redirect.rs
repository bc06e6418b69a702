// src/handlers/redirect.rs

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};

use crate::{error::AppError, services::request_meta::extract_event_metadata, state::AppState};

/// Redirects to the link target (302) and records the click.
///
/// The event row and the counter are written concurrently and independently.
/// Failures are logged and never block the redirect.
pub async fn follow_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let link = state
        .db
        .get_link_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Link not found".to_string()))?;

    let metadata = extract_event_metadata(&headers, state.geo.as_ref()).await;

    let (recorded, incremented) = tokio::join!(
        state.db.record_click(&link.id, &metadata),
        state.db.increment_link_clicks(&link.id),
    );

    if let Err(e) = recorded {
        tracing::error!(link_id = %link.id, "Failed to record click: {:?}", e);
    }
    if let Err(e) = incremented {
        tracing::error!(link_id = %link.id, "Failed to increment click count: {:?}", e);
    }

    Ok((StatusCode::FOUND, [(header::LOCATION, link.url)]))
}
