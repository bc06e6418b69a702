// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::Config;
use crate::db::Database;
use crate::services::geo::GeoLookup;
use crate::services::metadata::MetadataClient;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub metadata: MetadataClient,
    pub geo: Arc<dyn GeoLookup>,
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for MetadataClient {
    fn from_ref(state: &AppState) -> Self {
        state.metadata.clone()
    }
}

impl FromRef<AppState> for Arc<dyn GeoLookup> {
    fn from_ref(state: &AppState) -> Self {
        state.geo.clone()
    }
}
