// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    db::Database,
    error::AppError,
    models::user::{AdminUpdateUserRequest, USER_ROLES, USER_STATUSES},
};

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(db): State<Database>) -> Result<impl IntoResponse, AppError> {
    let users = db.list_users().await.map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(json!({ "users": users })))
}

/// Clears the PIN lock of an account.
/// Admin only.
pub async fn unlock_user(
    State(db): State<Database>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = db
        .unlock_user(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %user.id, "Account unlocked by admin");
    Ok(Json(json!({ "success": true, "user": user })))
}

/// Changes the status and/or role of a user.
/// Admin only.
pub async fn update_user(
    State(db): State<Database>,
    Path(id): Path<String>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(status) = payload.status.as_deref() {
        if !USER_STATUSES.contains(&status) {
            return Err(AppError::BadRequest(format!("Invalid status '{}'", status)));
        }
    }
    if let Some(role) = payload.role.as_deref() {
        if !USER_ROLES.contains(&role) {
            return Err(AppError::BadRequest(format!("Invalid role '{}'", role)));
        }
    }

    let user = db
        .update_user_status_and_role(&id, payload.status.as_deref(), payload.role.as_deref())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({ "success": true, "user": user })))
}
