//! Provider lookup and adapter construction.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use staysync_core::sync_error::SyncError;

use crate::adapter::ChannelAdapter;
use crate::http::ConnectionContext;
use crate::providers::{beds24, hub, Beds24Adapter, HubAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Beds24,
    Hub,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beds24 => beds24::PROVIDER,
            Self::Hub => hub::PROVIDER,
        }
    }

    /// Base URL used when the connection's credentials do not override it.
    pub fn default_base_url(self) -> Option<&'static str> {
        match self {
            Self::Beds24 => Some(beds24::DEFAULT_BASE_URL),
            Self::Hub => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "beds24" => Ok(Self::Beds24),
            "hub" => Ok(Self::Hub),
            other => Err(SyncError::validation(format!("Unknown provider: {other}"))),
        }
    }
}

/// Build the adapter for `provider` bound to one connection.
pub fn build_adapter(provider: Provider, ctx: ConnectionContext) -> Arc<dyn ChannelAdapter> {
    match provider {
        Provider::Beds24 => Arc::new(Beds24Adapter::new(ctx)),
        Provider::Hub => Arc::new(HubAdapter::new(ctx)),
    }
}
