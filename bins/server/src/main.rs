//! Fable API Server
//!
//! Main entry point for the image storage and garbage collection service.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fable_api::{AppState, Gc, create_router};
use fable_core::image::UploadLimits;
use fable_core::storage::ProviderRegistry;
use fable_db::{ImageReferenceRepository, ImageRepository, connect};
use fable_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fable=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Connect to database
    let db = connect(&config.database.url).await?;
    info!("Connected to database");

    // Build the provider registry
    let registry = Arc::new(ProviderRegistry::from_settings(&config.storage)?);
    let provider_names: Vec<&str> = registry.names().collect();
    info!(
        providers = ?provider_names,
        default = %config.storage.default_provider,
        "Object store providers configured"
    );

    // Repositories
    let images = Arc::new(ImageRepository::new(db.clone()));
    let refs = Arc::new(ImageReferenceRepository::new(db));

    // Garbage collector and periodic sweep
    let gc = Arc::new(Gc::new(
        images.clone(),
        refs.clone(),
        registry.clone(),
        Duration::from_secs(config.gc.grace_secs),
    ));
    let _sweeper = gc.run_sweeper(Duration::from_secs(config.gc.sweep_interval_secs));
    info!(
        grace_secs = config.gc.grace_secs,
        sweep_interval_secs = config.gc.sweep_interval_secs,
        "Garbage collector started"
    );

    // Create application state
    let state = AppState {
        registry,
        images,
        gc,
        limits: UploadLimits {
            max_file_size: config.storage.max_file_size,
            allowed_mime_types: config.storage.allowed_mime_types.clone(),
        },
    };

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
