// src/services/mod.rs

pub mod date_range;
pub mod geo;
pub mod metadata;
pub mod request_meta;
pub mod summary;
pub mod user_agent;
