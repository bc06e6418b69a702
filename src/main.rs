// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use linked::config::Config;
use linked::db::Database;
use linked::routes;
use linked::services::geo::{GeoLookup, IpApiGeoResolver, NoopGeoResolver};
use linked::services::metadata::MetadataClient;
use linked::state::AppState;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DB_CONNECT_RETRIES: u32 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (.env included)
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "linked.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Open the database with retry
    let mut retry_count = 0;
    let db = loop {
        match Database::connect(&config.database_url, 5).await {
            Ok(db) => break db,
            Err(e) => {
                retry_count += 1;
                if retry_count > DB_CONNECT_RETRIES {
                    tracing::error!(
                        "Failed to connect to database after {} retries: {}",
                        DB_CONNECT_RETRIES,
                        e
                    );
                    return Err(e.into());
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    tracing::info!("Running migrations...");
    db.migrate().await?;
    tracing::info!("Migrations applied successfully.");

    let geo: Arc<dyn GeoLookup> = if config.geo_api_url.trim().is_empty() {
        tracing::info!("Geo lookup disabled");
        Arc::new(NoopGeoResolver)
    } else {
        Arc::new(IpApiGeoResolver::new(&config.geo_api_url)?)
    };

    let state = AppState {
        db,
        metadata: MetadataClient::new()?,
        geo,
        config: config.clone(),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
