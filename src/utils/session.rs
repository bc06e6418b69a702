// src/utils/session.rs

//! Signed session tokens carried in the `user_session` cookie.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{error::AppError, models::user::User, state::AppState};

pub const SESSION_COOKIE: &str = "user_session";

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - the user id.
    pub sub: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// Signs a session token for `user_id` valid for `max_age_seconds`.
pub fn sign_session(user_id: &str, secret: &str, max_age_seconds: u64) -> Result<String, AppError> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + max_age_seconds as usize;

    let claims = Claims {
        sub: user_id.to_owned(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies signature and expiry of a session token.
pub fn verify_session(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Unauthorized".to_string()))?;

    Ok(token_data.claims)
}

/// Session cookie holding `token` for `max_age_seconds`.
pub fn session_cookie(token: String, max_age_seconds: u64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(max_age_seconds as i64))
        .build()
}

/// Empty, already expired session cookie.
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::ZERO)
        .build()
}

/// Signs a session for `user` and returns the cookie carrying it.
pub fn start_session(state: &AppState, user: &User) -> Result<Cookie<'static>, AppError> {
    let max_age = state.config.session_max_age;
    let token = sign_session(&user.id, &state.config.jwt_secret, max_age)?;
    Ok(session_cookie(token, max_age, state.config.cookie_secure))
}

/// Session token from the `user_session` cookie, or from an
/// `Authorization: Bearer` header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    let from_cookie = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value_trimmed().to_string())
        .filter(|value| !value.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(String::from)
    })
}

/// Resolves the session on `headers` to a user.
/// A missing, invalid or expired token, or an unknown user, is `None`.
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> Result<Option<User>, AppError> {
    let Some(token) = session_token(headers) else {
        return Ok(None);
    };
    let Ok(claims) = verify_session(&token, &state.config.jwt_secret) else {
        return Ok(None);
    };

    Ok(state.db.get_user_by_id(&claims.sub).await?)
}

/// Axum Middleware: Authentication.
///
/// Resolves the session to a `User` and injects it into the request
/// extensions. Returns 401 Unauthorized otherwise.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = current_user(&state, req.headers())
        .await?
        .ok_or_else(|| AppError::AuthError("Unauthorized".to_string()))?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let user = req
        .extensions()
        .get::<User>()
        .ok_or_else(|| AppError::AuthError("Unauthorized".to_string()))?;

    if !user.is_admin() {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn token_round_trip_and_tampering() {
        let token = sign_session("user-1", SECRET, 60).unwrap();
        assert_eq!(verify_session(&token, SECRET).unwrap().sub, "user-1");
        assert!(verify_session(&token, "other-secret").is_err());
        assert!(verify_session("user-1", SECRET).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims {
            sub: "user-1".to_string(),
            exp: 1_000_000,
        };
        let key = EncodingKey::from_secret(SECRET.as_bytes());
        let token = encode(&Header::default(), &claims, &key).unwrap();
        assert!(verify_session(&token, SECRET).is_err());
    }

    #[test]
    fn token_is_read_from_cookie_or_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; user_session=abc.def; x=1"),
        );
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer zzz"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc.def"));

        headers.remove(header::COOKIE);
        assert_eq!(session_token(&headers).as_deref(), Some("zzz"));

        headers.insert(header::COOKIE, HeaderValue::from_static("user_session="));
        headers.remove(header::AUTHORIZATION);
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn quoted_cookie_value_is_unwrapped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("user_session=\"abc.def\""));
        assert_eq!(session_token(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("tok".to_string(), 86_400, true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(86_400)));

        let insecure = session_cookie("tok".to_string(), 60, false);
        assert!(!insecure.to_string().contains("Secure"));

        let cleared = clear_session_cookie(false);
        assert_eq!(cleared.value(), "");
        assert_eq!(cleared.max_age(), Some(Duration::ZERO));
    }
}
