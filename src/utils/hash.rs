// src/utils/hash.rs

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use crate::error::AppError;

/// Hashes a PIN with Argon2 and a fresh random salt.
pub fn hash_pin(pin: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    let pin_hash = Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .to_string();

    Ok(pin_hash)
}

/// Checks a PIN against a stored hash. A malformed hash is an internal error,
/// a mismatch is `Ok(false)`.
pub fn verify_pin(pin: &str, pin_hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(pin_hash)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(pin.as_bytes(), &parsed_hash)
        .is_ok())
}
