use anyhow::Context;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tracker::config::Config;
use tracker::db::{
    self, PgAlertRepository, PgDeviceRepository, PgMaintenanceRepository, PgPlanRepository,
    PgReadingRepository,
};
use tracker::notify::LogNotifier;
use tracker::ports::Notifier;
use tracker::{build_state, metrics, rest, Repositories};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    info!("Starting device maintenance tracker");
    info!("HTTP server: {}", config.http_addr);
    info!("Database: {}", config.redacted_database_url());
    info!(
        auto_compute_alerts = config.auto_compute_alerts,
        notify_alerts = config.notify_alerts,
        "Alert pipeline configured"
    );

    metrics::init_metrics();

    let pool = db::make_pool(
        &config.database_url,
        config.db_max_connections,
        config.db_acquire_timeout,
    )
    .await
    .context("failed to connect to database")?;

    let repos = Repositories {
        devices: Arc::new(PgDeviceRepository::new(pool.clone())),
        plans: Arc::new(PgPlanRepository::new(pool.clone())),
        readings: Arc::new(PgReadingRepository::new(pool.clone())),
        alerts: Arc::new(PgAlertRepository::new(pool.clone())),
        maintenance: Arc::new(PgMaintenanceRepository::new(pool.clone())),
    };
    let notifier: Option<Arc<dyn Notifier>> = if config.notify_alerts {
        Some(Arc::new(LogNotifier))
    } else {
        None
    };
    let state = build_state(repos, config.auto_compute_alerts, notifier);

    let infra = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readiness", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(pool);

    let app = rest::create_router(state)
        .merge(infra)
        .layer(rest::cors_layer(config.cors_origins.as_deref()));

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.http_addr))?;

    info!("HTTP server listening on {}", config.http_addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
    Ok(())
}

async fn readiness_handler(State(pool): State<PgPool>) -> (StatusCode, &'static str) {
    match db::ping(&pool).await {
        Ok(()) => (StatusCode::OK, "ready"),
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
        }
    }
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}
