//! Adapter construction for connections.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use staysync_channels::adapter::ChannelAdapter;
use staysync_channels::http::{ConnectionContext, VariantMemory};
use staysync_channels::rate_limit::{RateLimiterRegistry, RetryPolicy};
use staysync_channels::registry::{build_adapter, Provider};
use staysync_core::sync_error::{SyncError, SyncResult};
use staysync_core::types::DbId;
use staysync_db::models::connection::Connection;

/// Builds the adapter for a connection.
#[async_trait]
pub trait AdapterSource: Send + Sync {
    async fn adapter_for(&self, connection: &Connection) -> SyncResult<Arc<dyn ChannelAdapter>>;
}

/// Builds HTTP adapters that share one client, one limiter per connection
/// and one endpoint-variant memory per connection.
pub struct HttpAdapterSource {
    client: reqwest::Client,
    limiters: RateLimiterRegistry,
    variants: Mutex<HashMap<DbId, Arc<VariantMemory>>>,
    default_requests_per_minute: u32,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpAdapterSource {
    pub fn new(client: reqwest::Client, default_requests_per_minute: u32, timeout: Duration) -> Self {
        Self {
            client,
            limiters: RateLimiterRegistry::new(),
            variants: Mutex::new(HashMap::new()),
            default_requests_per_minute,
            timeout,
            retry: RetryPolicy::default(),
        }
    }

    /// Backoff applied to retryable provider failures.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn variants_for(&self, connection_id: DbId) -> Arc<VariantMemory> {
        let mut variants = self
            .variants
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(variants.entry(connection_id).or_default())
    }
}

#[async_trait]
impl AdapterSource for HttpAdapterSource {
    async fn adapter_for(&self, connection: &Connection) -> SyncResult<Arc<dyn ChannelAdapter>> {
        let provider: Provider = connection.provider.parse()?;
        let base_url = connection
            .credentials
            .get("base_url")
            .and_then(|v| v.as_str())
            .or_else(|| provider.default_base_url())
            .ok_or_else(|| {
                SyncError::validation(format!(
                    "Connection {} has no base_url for provider {provider}",
                    connection.id
                ))
            })?
            .to_string();

        let rpm = connection
            .requests_per_minute
            .and_then(|r| u32::try_from(r).ok())
            .unwrap_or(self.default_requests_per_minute);

        let ctx = ConnectionContext {
            connection_id: connection.id,
            base_url,
            credentials: connection.credentials.clone(),
            access_token: connection.access_token.clone(),
            client: self.client.clone(),
            limiter: self.limiters.limiter_for(connection.id, rpm).await,
            variants: self.variants_for(connection.id),
            timeout: self.timeout,
            retry: self.retry,
        };
        Ok(build_adapter(provider, ctx))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;
    use staysync_core::sync_error::SyncErrorKind;

    use super::*;
    use crate::store::MemoryStore;

    fn source() -> HttpAdapterSource {
        HttpAdapterSource::new(reqwest::Client::new(), 60, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn beds24_uses_default_base_url() {
        let store = MemoryStore::new();
        let connection = store.add_connection("beds24", json!({}));
        let adapter = source().adapter_for(&connection).await.unwrap();
        assert_eq!(adapter.provider(), "beds24");
    }

    #[tokio::test]
    async fn hub_requires_base_url() {
        let store = MemoryStore::new();
        let connection = store.add_connection("hub", json!({"api_key": "k"}));
        let Err(err) = source().adapter_for(&connection).await else {
            panic!("hub connection without base_url must be rejected");
        };
        assert_matches!(err.kind, SyncErrorKind::Validation);
    }

    #[tokio::test]
    async fn unknown_provider_is_rejected() {
        let store = MemoryStore::new();
        let connection = store.add_connection("smoobu", json!({}));
        assert!(source().adapter_for(&connection).await.is_err());
    }

    #[test]
    fn variant_memory_is_shared_per_connection() {
        let source = source();
        assert!(Arc::ptr_eq(&source.variants_for(1), &source.variants_for(1)));
        assert!(!Arc::ptr_eq(&source.variants_for(1), &source.variants_for(2)));
    }
}
