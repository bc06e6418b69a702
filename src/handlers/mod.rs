// src/handlers/mod.rs

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod links;
pub mod metadata;
pub mod profile;
pub mod redirect;
