// src/db/users.rs

use chrono::Utc;
use uuid::Uuid;

use super::{Database, non_empty};
use crate::models::user::{ExternalProfile, MAX_FAILED_PIN_ATTEMPTS, PendingUserData, User};

/// Fields for a phone + PIN registration.
#[derive(Debug, Clone, Default)]
pub struct NewPhoneUser {
    pub username: String,
    pub display_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub pin_hash: String,
    pub external_id: Option<String>,
    pub pfp_url: Option<String>,
    pub account_address: Option<String>,
}

/// Outcome of [`Database::upsert_external_user`].
#[derive(Debug)]
pub enum ExternalLogin {
    SignedIn(User),
    Locked,
    /// The username belongs to an account with its own credentials.
    UsernameTaken,
}

impl Database {
    pub async fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await
    }

    pub async fn get_user_by_phone(&self, phone: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE phone = ?")
            .bind(phone)
            .fetch_optional(self.pool())
            .await
    }

    /// Case-insensitive username lookup.
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(username) = lower(?) LIMIT 1")
            .bind(username)
            .fetch_optional(self.pool())
            .await
    }

    pub async fn get_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE external_id = ?")
            .bind(external_id)
            .fetch_optional(self.pool())
            .await
    }

    pub async fn list_users(&self) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(self.pool())
            .await
    }

    /// The very first account becomes an admin.
    async fn role_for_new_user(&self) -> Result<&'static str, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool())
            .await?;
        Ok(if count == 0 { "admin" } else { "user" })
    }

    pub async fn create_user_with_phone(
        &self,
        new_user: NewPhoneUser,
    ) -> Result<User, sqlx::Error> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let role = self.role_for_new_user().await?;

        sqlx::query(
            r#"
            INSERT INTO users (
                id, external_id, phone, email, username, display_name,
                pfp_url, profile_picture, account_address, pin_hash,
                failed_pin_attempts, status, role, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 'active', ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(non_empty(new_user.external_id.as_deref()))
        .bind(&new_user.phone)
        .bind(non_empty(new_user.email.as_deref()))
        .bind(&new_user.username)
        .bind(&new_user.display_name)
        .bind(non_empty(new_user.pfp_url.as_deref()))
        .bind(non_empty(new_user.pfp_url.as_deref()))
        .bind(non_empty(new_user.account_address.as_deref()))
        .bind(&new_user.pin_hash)
        .bind(role)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        tracing::info!(
            user_id = %id,
            username = %new_user.username,
            role,
            "Created user with phone"
        );

        self.fetch_user(&id).await
    }

    async fn fetch_user(&self, user_id: &str) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(self.pool())
            .await
    }

    /// Stores a new PIN hash and clears the failed attempt counter.
    pub async fn set_user_pin(
        &self,
        user_id: &str,
        pin_hash: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET pin_hash = ?, failed_pin_attempts = 0, updated_at = ? WHERE id = ?",
        )
        .bind(pin_hash)
        .bind(Utc::now())
        .bind(user_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_user_by_id(user_id).await
    }

    /// Counts a wrong PIN. Returns the updated user and whether this attempt locked the account.
    pub async fn record_failed_pin_attempt(
        &self,
        user_id: &str,
    ) -> Result<(User, bool), sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE users
            SET failed_pin_attempts = failed_pin_attempts + 1,
                locked_at = CASE
                    WHEN failed_pin_attempts + 1 >= ? THEN COALESCE(locked_at, ?)
                    ELSE locked_at
                END,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(MAX_FAILED_PIN_ATTEMPTS)
        .bind(now)
        .bind(now)
        .bind(user_id)
        .execute(self.pool())
        .await?;

        let user = self.fetch_user(user_id).await?;
        let locked = user.is_locked();
        Ok((user, locked))
    }

    pub async fn reset_failed_pin_attempts(&self, user_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET failed_pin_attempts = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Clears the lock and the failed attempt counter.
    pub async fn unlock_user(&self, user_id: &str) -> Result<Option<User>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET locked_at = NULL, failed_pin_attempts = 0, updated_at = ? \
             WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_user_by_id(user_id).await
    }

    pub async fn update_user_status_and_role(
        &self,
        user_id: &str,
        status: Option<&str>,
        role: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET status = COALESCE(?, status),
                role = COALESCE(?, role),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(role)
        .bind(Utc::now())
        .bind(user_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        tracing::info!(user_id, ?status, ?role, "Updated user status/role");
        self.get_user_by_id(user_id).await
    }

    /// Attaches data from the external identity provider to an existing account.
    pub async fn link_external_account(
        &self,
        user_id: &str,
        pending: &PendingUserData,
    ) -> Result<Option<User>, sqlx::Error> {
        let Some(account_address) = non_empty(pending.account_address.as_deref()) else {
            return self.get_user_by_id(user_id).await;
        };

        let result = sqlx::query(
            r#"
            UPDATE users
            SET account_address = ?,
                external_id = COALESCE(?, external_id),
                username = COALESCE(?, username),
                name = COALESCE(?, name),
                pfp_url = COALESCE(?, pfp_url),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(account_address)
        .bind(non_empty(pending.external_id.as_deref()))
        .bind(non_empty(pending.username.as_deref()))
        .bind(non_empty(pending.display_name.as_deref()))
        .bind(non_empty(pending.pfp_url.as_deref()))
        .bind(Utc::now())
        .bind(user_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        tracing::info!(user_id, account_address, "Linked external account to user");
        self.get_user_by_id(user_id).await
    }

    /// Finds the account for an external identity, by external id first and
    /// then by username, refreshing its profile fields; creates it otherwise.
    ///
    /// A username match is only claimed when the account has neither a PIN
    /// nor another external id. Locked accounts are never signed in.
    pub async fn upsert_external_user(
        &self,
        external_id: &str,
        profile: &ExternalProfile,
    ) -> Result<ExternalLogin, sqlx::Error> {
        let username = non_empty(profile.username.as_deref());
        let display_name = non_empty(profile.display_name.as_deref());
        let pfp_url = non_empty(profile.pfp_url.as_deref());
        let address = non_empty(profile.public_address.as_deref());

        let existing = match self.get_user_by_external_id(external_id).await? {
            Some(user) => Some(user),
            None => match username {
                Some(name) => match self.get_user_by_username(name).await? {
                    Some(user) if user.is_locked() => return Ok(ExternalLogin::Locked),
                    Some(user) if user.has_pin() || user.external_id.is_some() => {
                        tracing::warn!(
                            user_id = %user.id,
                            external_id,
                            "Username owned by another account"
                        );
                        return Ok(ExternalLogin::UsernameTaken);
                    }
                    other => other,
                },
                None => None,
            },
        };

        if let Some(user) = existing {
            if user.is_locked() {
                return Ok(ExternalLogin::Locked);
            }

            sqlx::query(
                r#"
                UPDATE users
                SET external_id = ?,
                    username = COALESCE(?, username),
                    name = COALESCE(?, name),
                    pfp_url = COALESCE(?, pfp_url),
                    account_address = COALESCE(?, account_address),
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(external_id)
            .bind(username)
            .bind(display_name)
            .bind(pfp_url)
            .bind(address)
            .bind(Utc::now())
            .bind(&user.id)
            .execute(self.pool())
            .await?;

            tracing::info!(user_id = %user.id, external_id, "Refreshed user from external context");
            return self.fetch_user(&user.id).await.map(ExternalLogin::SignedIn);
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let role = self.role_for_new_user().await?;

        sqlx::query(
            r#"
            INSERT INTO users (
                id, external_id, username, name, display_name, pfp_url,
                profile_picture, account_address, failed_pin_attempts,
                status, role, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, 'active', ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(external_id)
        .bind(username)
        .bind(display_name)
        .bind(display_name)
        .bind(pfp_url)
        .bind(pfp_url)
        .bind(address)
        .bind(role)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        tracing::info!(user_id = %id, external_id, role, "Created user from external context");
        self.fetch_user(&id).await.map(ExternalLogin::SignedIn)
    }
}
