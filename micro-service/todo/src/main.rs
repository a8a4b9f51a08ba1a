use anyhow::Context;
use std::borrow::Cow;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use app_config::{AppConfig, MonitoringConfig};
use app_database::db_connect::initialize_db;
use app_error::{AppError, AppErrorExt};
use micro_todo::{routes::create_routes, state::AppState};

fn init_sentry(config: &AppConfig) -> Result<Option<sentry::ClientInitGuard>, AppError> {
    let sentry_config = &config.monitoring.sentry;
    if sentry_config.dsn.trim().is_empty() {
        return Ok(None);
    }

    let dsn = sentry_config
        .dsn
        .parse::<sentry::types::Dsn>()
        .context("Invalid Sentry DSN")
        .config_err()?;

    Ok(Some(sentry::init(sentry::ClientOptions {
        dsn: Some(dsn),
        release: sentry::release_name!(),
        environment: Some(Cow::Owned(config.environment.clone())),
        sample_rate: sentry_config.sample_rate,
        traces_sample_rate: sentry_config.traces_sample_rate,
        ..Default::default()
    })))
}

fn init_tracing(monitoring: &MonitoringConfig) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&monitoring.logging.level))
        .context("Invalid log level")
        .config_err()?;
    let json = monitoring.logging.format == "json";

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer().pretty()))
        .with(sentry_tracing::layer())
        .try_init()
        .context("Failed to set tracing subscriber")
        .server_err()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = AppConfig::load()?;

    let _sentry = init_sentry(&config)?;
    init_tracing(&config.monitoring)?;

    info!("Starting application at {}", chrono::Utc::now());

    let db = initialize_db(&config.database).await?;
    let state = AppState::new(db, &config).await?;

    // Configure application routes
    let app = create_routes(state, &config);

    let address = config.server.address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to address: {}", address))
        .server_err()?;

    info!("Listening on http://{}", address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
        .server_err()?;

    info!("Server stopped");
    Ok(())
}
