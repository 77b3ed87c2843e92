use std::sync::Arc;

use staysync_sync::{SyncRunner, SyncStore, WebhookProcessor};

use crate::config::ServerConfig;

/// Shared application state available to all handlers via axum's `State` extractor.
///
/// Must be `Clone` because axum clones state for each request. All inner fields
/// are reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SyncStore>,
    pub runner: Arc<SyncRunner>,
    pub webhooks: Arc<WebhookProcessor>,
    pub config: Arc<ServerConfig>,
}
