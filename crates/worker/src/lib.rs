//! Long-running sync scheduler process.
//!
//! The binary wires PostgreSQL and the HTTP adapters into [`run`]; tests
//! drive the same loop over the in-memory store.

use std::sync::Arc;

use staysync_sync::{AdapterSource, EngineConfig, Scheduler, SyncRunner, SyncStore};
use tokio_util::sync::CancellationToken;

/// Run the scheduler until `cancel` fires, then wait for in-flight runs.
pub async fn run(
    store: Arc<dyn SyncStore>,
    adapters: Arc<dyn AdapterSource>,
    config: EngineConfig,
    cancel: CancellationToken,
) {
    tracing::info!(
        max_in_flight = config.max_in_flight,
        short_horizon_days = config.horizons.short_days,
        long_horizon_days = config.horizons.long_days,
        "Worker starting",
    );
    let runner = Arc::new(SyncRunner::new(Arc::clone(&store), adapters, config));
    Scheduler::new(runner, store).run(cancel).await;
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use staysync_sync::store::MemoryStore;
    use staysync_sync::testing::{ScriptedAdapter, ScriptedSource};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn stops_when_cancelled() {
        let store = Arc::new(MemoryStore::new());
        store.add_connection("beds24", json!({}));
        let source = Arc::new(ScriptedSource::new(Arc::new(ScriptedAdapter::new())));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run(store, source, EngineConfig::default(), cancel.clone()));
        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(60), handle)
            .await
            .expect("worker stops after cancellation")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn due_connections_get_an_incremental_run() {
        let store = Arc::new(MemoryStore::new());
        let connection = store.add_connection("beds24", json!({}));
        let adapter = Arc::new(ScriptedAdapter::new());
        let source = Arc::new(ScriptedSource::new(Arc::clone(&adapter)));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run(
            store.clone(),
            source,
            EngineConfig::default(),
            cancel.clone(),
        ));
        // The first due check fires immediately; a never-synced connection is due.
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        handle.await.unwrap();

        let synced = store.connection(connection.id).await.unwrap().unwrap();
        assert!(synced.last_sync_at.is_some());
        assert!(store.sync_logs().iter().any(|e| e.sync_kind.as_deref() == Some("incremental")));
    }
}
