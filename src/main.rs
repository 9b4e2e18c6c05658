// main.rs
use device_rest_gateway::{
    commands::ShapeSet,
    config::{GatewaySettings, Settings},
    devices::InMemoryGateway,
    docs::ApiDoc,
    handlers,
    metrics::setup_metrics,
    models::AppState,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::new()
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.logging.filter))
        .map_err(|e| anyhow::anyhow!("Invalid log filter: {}", e))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if settings.metrics.enabled {
        setup_metrics(settings.metrics.port)
            .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;
        info!(port = settings.metrics.port, "Metrics exporter listening");
    }

    let gateway = load_gateway(&settings.gateway).await?;
    let gateway = Arc::new(gateway);

    let shapes = ShapeSet::registered()?;
    info!(shapes = ?shapes.tags().collect::<Vec<_>>(), "Command shapes registered");

    let state = Arc::new(AppState::new(gateway.clone(), gateway, shapes));

    let app = handlers::router(state, settings.server.max_body_bytes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&settings.server.address)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind address: {}", e))?;

    info!("Server started on {}", settings.server.address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

async fn load_gateway(settings: &GatewaySettings) -> anyhow::Result<InMemoryGateway> {
    let devices_file = &settings.devices_file;
    let gateway = if tokio::fs::try_exists(devices_file).await.unwrap_or(false) {
        InMemoryGateway::load(devices_file).await?
    } else {
        warn!(path = %devices_file.display(), "Device seed not found, starting with no devices");
        InMemoryGateway::new()
    };

    let gateway = gateway.with_history_limit(settings.history_limit);
    Ok(if settings.persist_updates {
        gateway.persist_to(devices_file)
    } else {
        gateway
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutting down");
}
