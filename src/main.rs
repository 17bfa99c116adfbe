use anyhow::Result;
use std::sync::Arc;

use fieldsheet_backend::config::{self, BackendKind};
use fieldsheet_backend::services::{AssessmentBackend, GoogleBackend, MemoryBackend};
use fieldsheet_backend::{app, logging};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = config::Settings::from_env()?;

    // Initialize logging
    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        backend = ?settings.backend,
        "Starting fieldsheet backend"
    );

    // Choose the destination backend once, at construction time
    let backend: Arc<dyn AssessmentBackend> = match settings.backend {
        BackendKind::Google => Arc::new(GoogleBackend::new(
            &settings.drive_api_url,
            &settings.drive_upload_url,
            &settings.sheets_api_url,
            &settings.google_access_token,
            &settings.assets_root_folder_id,
            settings.api_timeout_seconds,
        )?),
        BackendKind::Memory => {
            tracing::warn!("using in-memory backend; no documents will be written");
            Arc::new(MemoryBackend::new())
        }
    };

    // Check the destination is reachable (non-blocking)
    tokio::spawn({
        let backend = Arc::clone(&backend);
        async move {
            match backend.health_check().await {
                Ok(()) => tracing::info!("destination service is healthy"),
                Err(e) => tracing::warn!(error = %e, "destination health check failed - will retry on first request"),
            }
        }
    });

    // Create application state
    let state = app::AppState::new(settings.clone(), backend);

    // Build application
    let app = app::create_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
