// src/models/mod.rs

pub mod analytics;
pub mod link;
pub mod metadata;
pub mod user;
