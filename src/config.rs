// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Default geo-IP endpoint. `{ip}` is replaced with the client address.
pub const DEFAULT_GEO_API_URL: &str = "http://ip-api.com/json/{ip}?fields=status,country,city";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Secret used to sign session tokens.
    pub jwt_secret: String,
    /// Session lifetime in seconds, used for both the cookie max-age and the token expiry.
    pub session_max_age: u64,
    /// Adds the `Secure` attribute to the session cookie (HTTPS deployments).
    pub cookie_secure: bool,
    pub bind_addr: String,
    pub geo_api_url: String,
    pub cors_origins: Vec<String>,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://linked.db".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let session_max_age = env::var("SESSION_MAX_AGE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let cookie_secure = env::var("COOKIE_SECURE")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let geo_api_url = env::var("GEO_API_URL")
            .unwrap_or_else(|_| DEFAULT_GEO_API_URL.to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]
            });

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        Self {
            database_url,
            jwt_secret,
            session_max_age,
            cookie_secure,
            bind_addr,
            geo_api_url,
            cors_origins,
            rust_log,
        }
    }
}
