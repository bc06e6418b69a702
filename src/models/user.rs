// src/models/user.rs

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Consecutive wrong PINs after which an account is locked.
pub const MAX_FAILED_PIN_ATTEMPTS: i64 = 3;

pub const USER_ROLES: [&str; 3] = ["user", "organizer", "admin"];
pub const USER_STATUSES: [&str; 3] = ["active", "inactive", "banned"];

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid username regex"));
static PIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}$").expect("valid PIN regex"));
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?\d{10,15}$").expect("valid phone regex"));

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,

    /// Identifier assigned by the external identity provider.
    pub external_id: Option<String>,

    /// Login key, stored normalized (digits and an optional leading '+').
    pub phone: Option<String>,
    pub email: Option<String>,

    /// Unique, compared case-insensitively.
    pub username: Option<String>,
    pub name: Option<String>,
    pub pfp_url: Option<String>,
    pub display_name: Option<String>,
    pub profile_picture: Option<String>,
    pub account_address: Option<String>,

    /// Argon2 hash of the 4-digit PIN.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub pin_hash: Option<String>,

    pub failed_pin_attempts: i64,

    /// Set once the failed attempt limit is reached; only an admin clears it.
    pub locked_at: Option<DateTime<Utc>>,

    /// 'active', 'inactive' or 'banned'.
    pub status: String,

    /// 'user', 'organizer' or 'admin'.
    pub role: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    pub fn has_pin(&self) -> bool {
        self.pin_hash.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    /// Name shown to other people: display name, then provider name, then username.
    pub fn public_name(&self) -> Option<String> {
        self.display_name
            .clone()
            .or_else(|| self.name.clone())
            .or_else(|| self.username.clone())
    }
}

/// Removes spaces, dashes and parentheses from a phone number.
pub fn normalize_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect()
}

pub fn is_valid_phone(normalized: &str) -> bool {
    PHONE_RE.is_match(normalized)
}

pub fn is_valid_pin(pin: &str) -> bool {
    PIN_RE.is_match(pin)
}

/// Data supplied by the external identity provider while the user is
/// completing a phone login. Linked to the account when an address is present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUserData {
    #[serde(alias = "renaissanceId")]
    pub external_id: Option<String>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub pfp_url: Option<String>,
    pub account_address: Option<String>,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(
        length(min = 1, max = 50, message = "Username is required (max 50 characters)."),
        regex(
            path = *USERNAME_RE,
            message = "Username can only contain letters, numbers, and underscores"
        )
    )]
    pub username: String,

    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Name is required."))]
    pub name: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Phone number is required."))]
    pub phone: String,

    #[serde(default)]
    #[validate(regex(path = *PIN_RE, message = "PIN must be exactly 4 digits"))]
    pub pin: String,

    #[validate(email(message = "Invalid email address."))]
    pub email: Option<String>,

    pub pending_user_data: Option<PendingUserData>,
}

/// DTO for both steps of the phone login.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneLoginRequest {
    #[serde(default)]
    pub phone: String,
    pub pin: Option<String>,
    pub pending_user_data: Option<PendingUserData>,
}

/// DTO for first-time PIN creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPinRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub pin: String,
    pub pending_user_data: Option<PendingUserData>,
}

/// The provider sends numeric ids; strings are accepted too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExternalUserId {
    Number(i64),
    Text(String),
}

impl ExternalUserId {
    pub fn into_string(self) -> String {
        match self {
            ExternalUserId::Number(n) => n.to_string(),
            ExternalUserId::Text(s) => s,
        }
    }
}

/// Profile payload injected by the external identity provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalProfile {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub pfp_url: Option<String>,
    pub public_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextAuthRequest {
    #[serde(alias = "renaissanceUserId")]
    pub external_user_id: Option<ExternalUserId>,
    pub user: Option<ExternalProfile>,
}

/// Admin changes to a user. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub status: Option<String>,
    pub role: Option<String>,
}

/// Public part of a profile.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub pfp_url: Option<String>,
}

impl From<&User> for PublicProfile {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            display_name: user.public_name(),
            pfp_url: user.pfp_url.clone().or_else(|| user.profile_picture.clone()),
        }
    }
}
