use std::sync::Arc;
use std::time::Duration;

use staysync_sync::{EngineConfig, HttpAdapterSource, PgStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "staysync_worker=debug,staysync_sync=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = EngineConfig::from_env();

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = staysync_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    staysync_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    staysync_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    // --- Adapters ---
    let client = reqwest::Client::builder()
        .build()
        .expect("Failed to build HTTP client");
    let adapters = Arc::new(HttpAdapterSource::new(
        client,
        config.default_requests_per_minute,
        config.adapter_timeout,
    )
    .with_retry(config.adapter_retry));

    // --- Scheduler ---
    let cancel = CancellationToken::new();
    let drain_limit = config.run_timeout + Duration::from_secs(30);
    let scheduler = tokio::spawn(staysync_worker::run(
        Arc::new(PgStore::new(pool)),
        adapters,
        config,
        cancel.clone(),
    ));

    staysync_worker::shutdown_signal().await;
    cancel.cancel();

    // In-flight runs are bounded by the run timeout; leases expire on their own
    // if we give up waiting.
    if tokio::time::timeout(drain_limit, scheduler).await.is_err() {
        tracing::warn!("In-flight sync runs did not finish before the drain limit");
    }
    tracing::info!("Worker stopped");
}
