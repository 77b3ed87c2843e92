//! HTTP plumbing shared by the provider adapters.
//!
//! [`ConnectionContext`] is everything an adapter needs to talk to one
//! provider account. [`ConnectionContext::send`] throttles through the
//! connection's limiter, bounds each attempt with a timeout, classifies every
//! failure into a [`SyncError`] and backs off on retryable ones.
//! [`ConnectionContext::send_with_variants`] layers endpoint-variant fallback
//! on top.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Request, RequestBuilder};
use serde_json::{json, Value};
use staysync_core::sync_error::{truncate, SyncError, SyncErrorKind, SyncResult, SNAPSHOT_BODY_LIMIT};
use staysync_core::types::DbId;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::rate_limit::{parse_retry_after, RetryPolicy, SlidingWindowLimiter};

// ---------------------------------------------------------------------------
// Endpoint variants
// ---------------------------------------------------------------------------

/// One candidate URL shape for an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointVariant {
    pub path: String,
    pub query: Vec<(&'static str, String)>,
}

impl EndpointVariant {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn param(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }
}

/// Which variant index last succeeded, per operation, for one connection.
#[derive(Debug, Default)]
pub struct VariantMemory {
    preferred: Mutex<HashMap<String, usize>>,
}

impl VariantMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn preferred(&self, operation: &str) -> Option<usize> {
        self.preferred.lock().await.get(operation).copied()
    }

    pub async fn remember(&self, operation: &str, index: usize) {
        self.preferred
            .lock()
            .await
            .insert(operation.to_string(), index);
    }
}

/// Try order: the remembered variant first, then the rest in declared order.
fn attempt_order(count: usize, preferred: Option<usize>) -> Vec<usize> {
    if count == 0 {
        return Vec::new();
    }
    let first = preferred.filter(|i| *i < count).unwrap_or(0);
    std::iter::once(first)
        .chain((0..count).filter(move |i| *i != first))
        .collect()
}

// ---------------------------------------------------------------------------
// ConnectionContext
// ---------------------------------------------------------------------------

/// Per-connection state handed to an adapter at construction.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub connection_id: DbId,
    pub base_url: String,
    /// Provider-specific opaque credentials (API keys, backend codes...).
    pub credentials: Value,
    pub access_token: Option<String>,
    pub client: Client,
    pub limiter: Arc<SlidingWindowLimiter>,
    pub variants: Arc<VariantMemory>,
    /// Bound on a single attempt.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

/// A failed attempt plus the provider's Retry-After hint, if it sent one.
struct Failure {
    error: SyncError,
    retry_after: Option<Duration>,
}

impl From<SyncError> for Failure {
    fn from(error: SyncError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

impl ConnectionContext {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// String credential by key.
    pub fn credential(&self, key: &str) -> Option<&str> {
        self.credentials.get(key).and_then(Value::as_str)
    }

    /// Send one request and parse a JSON body.
    ///
    /// `RATE_LIMIT`, `TIMEOUT` and `NETWORK` failures are retried under the
    /// context's [`RetryPolicy`]; a 429's Retry-After replaces the computed
    /// delay. An empty success body yields `Value::Null`.
    pub async fn send(&self, request: RequestBuilder) -> SyncResult<Value> {
        let request = request.timeout(self.timeout).build().map_err(classify)?;
        let mut failed = 0;

        loop {
            // Streaming bodies cannot be replayed; they get a single attempt.
            let Some(attempt) = request.try_clone() else {
                return self.send_once(request).await.map_err(|f| f.error);
            };
            let failure = match self.send_once(attempt).await {
                Ok(body) => return Ok(body),
                Err(failure) => failure,
            };
            failed += 1;
            if !failure.error.is_retryable() || !self.retry.allows_retry(failed) {
                return Err(failure.error);
            }
            let wait = self.retry.backoff(failed, failure.retry_after);
            warn!(
                connection_id = self.connection_id,
                kind = %failure.error.kind,
                attempt = failed,
                wait_ms = wait.as_millis() as u64,
                path = request.url().path(),
                "Retryable provider failure, backing off"
            );
            tokio::time::sleep(wait).await;
        }
    }

    async fn send_once(&self, request: Request) -> Result<Value, Failure> {
        self.limiter.acquire().await;

        let method = request.method().clone();
        let url = request.url().clone();

        let response = match tokio::time::timeout(self.timeout, self.client.execute(request)).await
        {
            Ok(result) => result.map_err(classify)?,
            Err(_) => {
                return Err(SyncError::timeout(format!(
                    "{method} {} timed out after {:?}",
                    url.path(),
                    self.timeout
                ))
                .into())
            }
        };

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await.map_err(classify)?;

        if !status.is_success() {
            let err = SyncError::from_http_status(status.as_u16(), &body).with_snapshot(json!({
                "request": { "method": method.as_str(), "path": url.path(), "query": url.query() },
                "status": status.as_u16(),
                "body": truncate(&body, SNAPSHOT_BODY_LIMIT),
            }));
            if err.kind != SyncErrorKind::NotFound {
                warn!(
                    connection_id = self.connection_id,
                    status = status.as_u16(),
                    path = url.path(),
                    "Provider call failed"
                );
            }
            let retry_after = retry_after.filter(|_| err.kind == SyncErrorKind::RateLimit);
            return Err(Failure {
                error: err,
                retry_after,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| {
            SyncError::validation(format!("Malformed JSON from {}: {e}", url.path()))
                .with_snapshot(json!({ "body": truncate(&body, SNAPSHOT_BODY_LIMIT) }))
                .into()
        })
    }

    /// Try `variants` until one succeeds, falling through only on `NOT_FOUND`.
    ///
    /// The winning index is remembered under `operation`, so later calls for
    /// this connection go straight to it.
    pub async fn send_with_variants<F>(
        &self,
        operation: &str,
        variants: &[EndpointVariant],
        build: F,
    ) -> SyncResult<Value>
    where
        F: Fn(&EndpointVariant) -> RequestBuilder + Send + Sync,
    {
        let order = attempt_order(variants.len(), self.variants.preferred(operation).await);
        let mut last_err = None;

        for index in order {
            let variant = &variants[index];
            match self.send(build(variant)).await {
                Ok(body) => {
                    self.variants.remember(operation, index).await;
                    return Ok(body);
                }
                Err(err) if err.kind == SyncErrorKind::NotFound => {
                    debug!(
                        connection_id = self.connection_id,
                        operation,
                        path = %variant.path,
                        "Endpoint variant not found, trying next"
                    );
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            SyncError::not_found(format!("No endpoint variants configured for {operation}"))
        }))
    }
}

/// Map a transport-level reqwest error to the taxonomy.
fn classify(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::timeout(err.to_string())
    } else if err.is_connect() || err.is_request() || err.is_body() {
        SyncError::network(err.to_string())
    } else if err.is_decode() || err.is_builder() {
        SyncError::validation(err.to_string())
    } else if let Some(status) = err.status() {
        SyncError::from_http_status(status.as_u16(), &err.to_string())
    } else {
        SyncError::unknown(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remembered_variant_goes_first() {
        assert_eq!(attempt_order(3, None), vec![0, 1, 2]);
        assert_eq!(attempt_order(3, Some(1)), vec![1, 0, 2]);
        assert_eq!(attempt_order(2, Some(5)), vec![0, 1]);
        assert!(attempt_order(0, None).is_empty());
    }

    #[tokio::test]
    async fn memory_is_per_operation() {
        let memory = VariantMemory::new();
        memory.remember("availability", 1).await;
        assert_eq!(memory.preferred("availability").await, Some(1));
        assert_eq!(memory.preferred("rates").await, None);
    }
}
