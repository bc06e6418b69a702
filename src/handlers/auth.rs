// src/handlers/auth.rs

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use validator::Validate;

use crate::{
    db::{
        is_unique_violation,
        users::{ExternalLogin, NewPhoneUser},
    },
    error::AppError,
    models::user::{
        ContextAuthRequest, MAX_FAILED_PIN_ATTEMPTS, PendingUserData, PhoneLoginRequest,
        RegisterRequest, SetPinRequest, User, is_valid_phone, is_valid_pin, normalize_phone,
    },
    state::AppState,
    utils::{
        hash::{hash_pin, verify_pin},
        session::{clear_session_cookie, current_user, start_session},
    },
};

/// Response for a completed login: session cookie plus the user.
fn logged_in(state: &AppState, status: StatusCode, user: &User) -> Result<Response, AppError> {
    let cookie = start_session(state, user)?;
    Ok((
        status,
        CookieJar::new().add(cookie),
        Json(json!({ "success": true, "user": user })),
    )
        .into_response())
}

fn required_phone(phone: &str) -> Result<String, AppError> {
    if phone.trim().is_empty() {
        return Err(AppError::BadRequest("Phone number is required".to_string()));
    }
    Ok(normalize_phone(phone))
}

/// Links pending external identity data to `user` when it carries an account address.
async fn apply_pending(
    state: &AppState,
    user: User,
    pending: Option<&PendingUserData>,
) -> Result<User, AppError> {
    let Some(pending) =
        pending.filter(|p| p.account_address.as_deref().is_some_and(|a| !a.is_empty()))
    else {
        return Ok(user);
    };

    match state.db.link_external_account(&user.id, pending).await {
        Ok(Some(linked)) => Ok(linked),
        Ok(None) => Ok(user),
        Err(e) if is_unique_violation(&e) => Err(AppError::Conflict(
            "External account is already linked to another user".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Registers a new account with phone and PIN.
///
/// The PIN is hashed with Argon2 before storing it.
/// Returns 201 Created with the user and a session cookie.
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.username = payload.username.trim().to_string();
    payload.name = payload.name.trim().to_string();

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let phone = normalize_phone(&payload.phone);
    if !is_valid_phone(&phone) {
        return Err(AppError::BadRequest("Invalid phone number format".to_string()));
    }

    if state.db.get_user_by_phone(&phone).await?.is_some() {
        return Err(AppError::Conflict("Phone number already registered".to_string()));
    }
    if state.db.get_user_by_username(&payload.username).await?.is_some() {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }

    let pin_hash = hash_pin(&payload.pin)?;
    let pending = payload.pending_user_data.unwrap_or_default();

    let user = state
        .db
        .create_user_with_phone(NewPhoneUser {
            username: payload.username.clone(),
            display_name: payload.name,
            phone,
            email: payload.email.map(|e| e.trim().to_string()),
            pin_hash,
            external_id: pending.external_id,
            pfp_url: pending.pfp_url,
            account_address: pending.account_address,
        })
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Username '{}' already exists", payload.username))
            } else {
                tracing::error!("Failed to register user: {:?}", e);
                AppError::from(e)
            }
        })?;

    logged_in(&state, StatusCode::CREATED, &user)
}

/// Two-step phone login.
///
/// Without a PIN, reports whether the account needs one set or expects one.
/// With a PIN, verifies it and starts a session. The lock is checked before
/// the PIN, so a locked account stays locked whatever is entered.
pub async fn phone_login(
    State(state): State<AppState>,
    Json(payload): Json<PhoneLoginRequest>,
) -> Result<Response, AppError> {
    let phone = required_phone(&payload.phone)?;

    let user = state
        .db
        .get_user_by_phone(&phone)
        .await?
        .ok_or_else(|| AppError::NotFound("No account found with this phone number".to_string()))?;

    if user.is_locked() {
        return Err(AppError::Locked(
            "Account is locked. Please contact an administrator.".to_string(),
        ));
    }

    let pin = payload.pin.as_deref().filter(|p| !p.is_empty());

    let (Some(pin), Some(pin_hash)) = (pin, user.pin_hash.as_deref()) else {
        let body = if user.has_pin() {
            json!({
                "requiresPin": true,
                "hasPin": true,
                "isLocked": false,
                "userId": user.id,
            })
        } else {
            json!({
                "needsSetPin": true,
                "hasPin": false,
                "userId": user.id,
                "displayName": user.display_name.as_ref().or(user.username.as_ref()),
            })
        };
        return Ok(Json(body).into_response());
    };

    if !verify_pin(pin, pin_hash)? {
        let (updated, locked) = state.db.record_failed_pin_attempt(&user.id).await?;

        if locked {
            tracing::warn!(user_id = %user.id, "Account locked after failed PIN attempts");
            return Err(AppError::Locked(
                "Account has been locked due to too many failed attempts. Please contact an administrator."
                    .to_string(),
            ));
        }

        let attempts_remaining = MAX_FAILED_PIN_ATTEMPTS - updated.failed_pin_attempts;
        tracing::info!(user_id = %user.id, attempts_remaining, "Invalid PIN");
        return Err(AppError::InvalidPin { attempts_remaining });
    }

    state.db.reset_failed_pin_attempts(&user.id).await?;
    let user = apply_pending(&state, user, payload.pending_user_data.as_ref()).await?;

    tracing::info!(user_id = %user.id, "User logged in with phone");
    logged_in(&state, StatusCode::OK, &user)
}

/// Sets the first PIN of an account that has none, then logs in.
pub async fn set_pin(
    State(state): State<AppState>,
    Json(payload): Json<SetPinRequest>,
) -> Result<Response, AppError> {
    let phone = required_phone(&payload.phone)?;

    if payload.pin.trim().is_empty() {
        return Err(AppError::BadRequest("PIN is required".to_string()));
    }
    if !is_valid_pin(&payload.pin) {
        return Err(AppError::BadRequest("PIN must be exactly 4 digits".to_string()));
    }

    let user = state
        .db
        .get_user_by_phone(&phone)
        .await?
        .ok_or_else(|| AppError::NotFound("No account found with this phone number".to_string()))?;

    if user.has_pin() {
        return Err(AppError::BadRequest(
            "This account already has a PIN. Use the login flow instead.".to_string(),
        ));
    }

    let pin_hash = hash_pin(&payload.pin)?;
    let user = state
        .db
        .set_user_pin(&user.id, &pin_hash)
        .await?
        .ok_or_else(|| AppError::InternalServerError("Failed to set PIN".to_string()))?;
    let user = apply_pending(&state, user, payload.pending_user_data.as_ref()).await?;

    tracing::info!(user_id = %user.id, "PIN set");
    logged_in(&state, StatusCode::OK, &user)
}

/// Signs in (or creates) the user described by the external identity provider.
pub async fn context(
    State(state): State<AppState>,
    Json(payload): Json<ContextAuthRequest>,
) -> Result<Response, AppError> {
    let external_id = payload
        .external_user_id
        .map(|id| id.into_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("externalUserId is required".to_string()))?;

    let profile = payload.user.unwrap_or_default();
    let login = state
        .db
        .upsert_external_user(&external_id, &profile)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Username already taken".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    let user = match login {
        ExternalLogin::SignedIn(user) => user,
        ExternalLogin::Locked => {
            return Err(AppError::Locked(
                "Account is locked. Please contact an administrator.".to_string(),
            ));
        }
        ExternalLogin::UsernameTaken => {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }
    };

    tracing::info!(
        user_id = %user.id,
        external_id = %external_id,
        "User authenticated from context"
    );
    logged_in(&state, StatusCode::OK, &user)
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    (
        jar.add(clear_session_cookie(state.config.cookie_secure)),
        Json(json!({ "success": true })),
    )
}

/// Current user, or `{"user": null}` with the session cookie cleared.
pub async fn me(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    match current_user(&state, &headers).await? {
        Some(user) => Ok(Json(json!({ "user": user })).into_response()),
        None => Ok((
            jar.add(clear_session_cookie(state.config.cookie_secure)),
            Json(json!({ "user": null })),
        )
            .into_response()),
    }
}
