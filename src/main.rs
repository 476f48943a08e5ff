//! Churn inference server entry point

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use churn_serving::config::{Config, LogFormat};
use churn_serving::{bootstrap, create_router, AppState};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "churn_serving=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Invalid configuration")?;

    // Initialize logging
    init_tracing(config.log_format);

    config.validate().context("Invalid configuration")?;

    tracing::info!("Churn inference service starting ({})...", config.environment);

    let schema = Arc::new(bootstrap::load_schema(&config).context("Invalid feature schema")?);
    let state = AppState::new(Arc::clone(&schema));
    let app = create_router(state.clone());

    // Bind before the model is ready so /health and /metrics answer during startup
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("🚀 Server listening on http://{}", addr);

    tokio::spawn(async move {
        match bootstrap::build_service(&config, schema).await {
            Ok(service) => {
                state.publish(Arc::new(service));
                tracing::info!("Inference service ready");
            }
            Err(e) => {
                tracing::error!("Startup failed: {}", e);
                std::process::exit(1);
            }
        }
    });

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
