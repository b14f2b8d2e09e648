use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use fleet_maintenance::{
    api::{self, AppState},
    assistant::FleetAssistant,
    config::ServiceConfig,
    telemetry::TelemetryRepo,
    FileModelStore, MaintenanceService, TrainingConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_maintenance=info,tower_http=info".into()),
        )
        .init();

    let cfg = ServiceConfig::from_env();

    // Blocks until the model is ready; training only happens on a cold start.
    let store = FileModelStore::new(&cfg.model_path);
    tracing::info!("model file: {}", store.path().display());
    let service = MaintenanceService::start(&store, &TrainingConfig::default());

    let telemetry = match TelemetryRepo::open(&cfg.database_path) {
        Ok(repo) => {
            tracing::info!("telemetry database: {}", cfg.database_path.display());
            Some(Arc::new(repo))
        }
        Err(e) => {
            tracing::warn!("cannot open telemetry database {}: {}", cfg.database_path.display(), e);
            None
        }
    };

    let state = AppState {
        service: Arc::new(service),
        telemetry,
        assistant: Arc::new(FleetAssistant::new(
            cfg.openai_api_key.clone(),
            cfg.openai_base_url.clone(),
            cfg.openai_model.clone(),
        )),
        telemetry_window: cfg.telemetry_window,
    };

    let app = api::router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}
