use std::str::FromStr;
use std::time::Duration;

use staysync_channels::rate_limit::RetryPolicy;
use staysync_core::cadence::{Horizons, DEFAULT_LONG_HORIZON_DAYS, DEFAULT_SHORT_HORIZON_DAYS};

/// Engine configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on concurrently running syncs across all connections.
    pub max_in_flight: usize,
    pub horizons: Horizons,
    /// Lifetime of a connection's sync lease.
    pub lock_lease: Duration,
    /// Wall-clock bound on a single run.
    pub run_timeout: Duration,
    /// Per-attempt timeout for provider calls.
    pub adapter_timeout: Duration,
    /// Backoff for rate-limited, timed-out and network-failed provider calls.
    pub adapter_retry: RetryPolicy,
    /// Budget used when a connection declares no requests-per-minute limit.
    pub default_requests_per_minute: u32,
    /// Refresh access tokens expiring within this window.
    pub token_refresh_skew: Duration,
    /// How often the scheduler looks for connections whose interval sync is due.
    pub due_check_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            horizons: Horizons::default(),
            lock_lease: Duration::from_secs(1800),
            run_timeout: Duration::from_secs(1200),
            adapter_timeout: Duration::from_secs(30),
            adapter_retry: RetryPolicy::default(),
            default_requests_per_minute: 60,
            token_refresh_skew: Duration::from_secs(300),
            due_check_interval: Duration::from_secs(60),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `MAX_IN_FLIGHT_SYNCS`         | `8`     |
    /// | `SHORT_HORIZON_DAYS`          | `30`    |
    /// | `LONG_HORIZON_DAYS`           | `548`   |
    /// | `SYNC_LOCK_LEASE_SECS`        | `1800`  |
    /// | `RUN_TIMEOUT_SECS`            | `1200`  |
    /// | `ADAPTER_TIMEOUT_SECS`        | `30`    |
    /// | `ADAPTER_MAX_ATTEMPTS`        | `3`     |
    /// | `ADAPTER_RETRY_BASE_MS`       | `1000`  |
    /// | `ADAPTER_RETRY_MAX_MS`        | `30000` |
    /// | `DEFAULT_REQUESTS_PER_MINUTE` | `60`    |
    /// | `TOKEN_REFRESH_SKEW_SECS`     | `300`   |
    /// | `DUE_CHECK_INTERVAL_SECS`     | `60`    |
    pub fn from_env() -> Self {
        Self {
            max_in_flight: env_or("MAX_IN_FLIGHT_SYNCS", 8),
            horizons: Horizons {
                short_days: env_or("SHORT_HORIZON_DAYS", DEFAULT_SHORT_HORIZON_DAYS),
                long_days: env_or("LONG_HORIZON_DAYS", DEFAULT_LONG_HORIZON_DAYS),
            },
            lock_lease: Duration::from_secs(env_or("SYNC_LOCK_LEASE_SECS", 1800)),
            run_timeout: Duration::from_secs(env_or("RUN_TIMEOUT_SECS", 1200)),
            adapter_timeout: Duration::from_secs(env_or("ADAPTER_TIMEOUT_SECS", 30)),
            adapter_retry: RetryPolicy {
                max_attempts: env_or("ADAPTER_MAX_ATTEMPTS", 3),
                base_delay: Duration::from_millis(env_or("ADAPTER_RETRY_BASE_MS", 1000)),
                max_delay: Duration::from_millis(env_or("ADAPTER_RETRY_MAX_MS", 30_000)),
            },
            default_requests_per_minute: env_or("DEFAULT_REQUESTS_PER_MINUTE", 60),
            token_refresh_skew: Duration::from_secs(env_or("TOKEN_REFRESH_SKEW_SECS", 300)),
            due_check_interval: Duration::from_secs(env_or("DUE_CHECK_INTERVAL_SECS", 60)),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid number")),
        Err(_) => default,
    }
}
