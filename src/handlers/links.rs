// src/handlers/links.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use url::Url;
use validator::Validate;

use crate::{
    db::Database,
    error::AppError,
    models::{
        link::{CreateLinkRequest, Link, ReorderLinksRequest, UpdateLinkRequest},
        user::User,
    },
};

fn ensure_valid_url(url: &str) -> Result<(), AppError> {
    Url::parse(url)
        .map(|_| ())
        .map_err(|_| AppError::BadRequest("Invalid URL format".to_string()))
}

/// Loads a link and checks that `user` owns it.
pub(crate) async fn owned_link(
    db: &Database,
    user: &User,
    link_id: &str,
) -> Result<Link, AppError> {
    let link = db
        .get_link_by_id(link_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Link not found".to_string()))?;

    if link.user_id != user.id {
        return Err(AppError::Forbidden("Forbidden".to_string()));
    }

    Ok(link)
}

/// Lists the current user's links in display order.
pub async fn list_links(
    State(db): State<Database>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, AppError> {
    let links = db.list_links_by_user(&user.id).await?;
    Ok(Json(json!({ "links": links })))
}

/// Creates a link at the end of the current user's list.
pub async fn create_link(
    State(db): State<Database>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    ensure_valid_url(&payload.url)?;

    let link = db.create_link(&user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "link": link }))))
}

pub async fn get_link(
    State(db): State<Database>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let link = owned_link(&db, &user, &id).await?;
    Ok(Json(json!({ "link": link })))
}

/// Partial update. Absent fields are kept, explicit nulls clear them.
pub async fn update_link(
    State(db): State<Database>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateLinkRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(url) = payload.url.as_deref() {
        ensure_valid_url(url)?;
    }

    let mut link = owned_link(&db, &user, &id).await?;
    payload.apply_to(&mut link);
    db.update_link(&mut link).await?;

    Ok(Json(json!({ "link": link })))
}

pub async fn delete_link(
    State(db): State<Database>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    owned_link(&db, &user, &id).await?;

    if !db.delete_link(&id).await? {
        return Err(AppError::NotFound("Link not found".to_string()));
    }

    Ok(Json(json!({ "success": true })))
}

/// Rewrites positions so they follow the order of `linkIds`.
pub async fn reorder_links(
    State(db): State<Database>,
    Extension(user): Extension<User>,
    Json(payload): Json<ReorderLinksRequest>,
) -> Result<impl IntoResponse, AppError> {
    let link_ids = payload
        .link_ids
        .ok_or_else(|| AppError::BadRequest("linkIds array is required".to_string()))?;

    db.reorder_links(&user.id, &link_ids).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn link_stats(
    State(db): State<Database>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, AppError> {
    let stats = db.link_stats(&user.id).await?;
    Ok(Json(stats))
}
