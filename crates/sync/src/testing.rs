//! Scripted adapter and adapter source for driving the engine in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use staysync_channels::adapter::ChannelAdapter;
use staysync_channels::capability::{Capabilities, Capability};
use staysync_channels::dto::{
    DayDto, Page, Pagination, PropertyDto, RateDto, ReservationDto, ReservationFilter,
    RoomTypeDto, TokenGrant,
};
use staysync_core::cadence::DateRange;
use staysync_core::sync_error::{SyncError, SyncResult};
use staysync_core::types::DbId;
use staysync_db::models::connection::Connection;

use crate::source::AdapterSource;

/// What the scripted provider returns.
#[derive(Default)]
pub struct Script {
    pub properties: Vec<PropertyDto>,
    /// Availability by room external id.
    pub availability: HashMap<String, Vec<DayDto>>,
    /// Rates by room external id.
    pub rates: HashMap<String, Vec<RateDto>>,
    pub reservations: Vec<ReservationDto>,
    /// Result of a token refresh; `None` rejects the refresh token.
    pub refresh: Option<TokenGrant>,
    /// Errors returned instead of data, per operation.
    pub failures: HashMap<Capability, SyncError>,
    /// Delay applied before every call.
    pub delay: Option<Duration>,
    calls: HashMap<Capability, u32>,
}

/// In-process provider. Every read capability plus token refresh is
/// supported unless constructed with an explicit set.
pub struct ScriptedAdapter {
    capabilities: Capabilities,
    script: Mutex<Script>,
}

impl Default for ScriptedAdapter {
    fn default() -> Self {
        Self::with_capabilities(&[
            Capability::RefreshToken,
            Capability::ListProperties,
            Capability::ListRoomTypes,
            Capability::GetAvailability,
            Capability::GetRates,
            Capability::ListReservations,
        ])
    }
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(capabilities: &[Capability]) -> Self {
        Self {
            capabilities: Capabilities::of(capabilities),
            script: Mutex::new(Script::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Edit what the provider returns from now on.
    pub fn script(&self, edit: impl FnOnce(&mut Script)) {
        edit(&mut self.lock());
    }

    /// How many times `capability` was invoked.
    pub fn calls(&self, capability: Capability) -> u32 {
        self.lock().calls.get(&capability).copied().unwrap_or(0)
    }

    async fn enter(&self, capability: Capability) -> SyncResult<()> {
        let delay = {
            let mut script = self.lock();
            *script.calls.entry(capability).or_default() += 1;
            if let Some(err) = script.failures.get(&capability) {
                return Err(err.clone());
            }
            script.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for ScriptedAdapter {
    fn provider(&self) -> &'static str {
        "scripted"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn refresh_token(&self, _refresh_token: &str) -> SyncResult<TokenGrant> {
        self.enter(Capability::RefreshToken).await?;
        self.lock()
            .refresh
            .clone()
            .ok_or_else(|| SyncError::auth_failed("Refresh token rejected"))
    }

    async fn list_properties(&self, _page: Pagination) -> SyncResult<Page<PropertyDto>> {
        self.enter(Capability::ListProperties).await?;
        Ok(Page {
            items: self.lock().properties.clone(),
            next: None,
        })
    }

    async fn list_room_types(&self, property_external_id: &str) -> SyncResult<Vec<RoomTypeDto>> {
        self.enter(Capability::ListRoomTypes).await?;
        Ok(self
            .lock()
            .properties
            .iter()
            .filter(|p| p.external_id == property_external_id)
            .flat_map(|p| p.room_types.clone())
            .collect())
    }

    async fn get_availability(
        &self,
        _property_external_id: &str,
        room_external_id: &str,
        _range: DateRange,
    ) -> SyncResult<Vec<DayDto>> {
        self.enter(Capability::GetAvailability).await?;
        Ok(self
            .lock()
            .availability
            .get(room_external_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_rates(
        &self,
        _property_external_id: &str,
        room_external_id: &str,
        _range: DateRange,
    ) -> SyncResult<Vec<RateDto>> {
        self.enter(Capability::GetRates).await?;
        Ok(self
            .lock()
            .rates
            .get(room_external_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_reservations(
        &self,
        _filter: &ReservationFilter,
    ) -> SyncResult<Vec<ReservationDto>> {
        self.enter(Capability::ListReservations).await?;
        Ok(self.lock().reservations.clone())
    }
}

/// Hands out scripted adapters: a per-connection override or the default.
#[derive(Default)]
pub struct ScriptedSource {
    default: Arc<ScriptedAdapter>,
    overrides: Mutex<HashMap<DbId, Arc<ScriptedAdapter>>>,
    tokens: Mutex<Vec<Option<String>>>,
}

impl ScriptedSource {
    pub fn new(default: Arc<ScriptedAdapter>) -> Self {
        Self {
            default,
            ..Default::default()
        }
    }

    pub fn set(&self, connection_id: DbId, adapter: Arc<ScriptedAdapter>) {
        self.overrides
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(connection_id, adapter);
    }

    /// Access tokens adapters were built with, in order.
    pub fn tokens_seen(&self) -> Vec<Option<String>> {
        self.tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl AdapterSource for ScriptedSource {
    async fn adapter_for(&self, connection: &Connection) -> SyncResult<Arc<dyn ChannelAdapter>> {
        self.tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(connection.access_token.clone());
        let adapter = self
            .overrides
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&connection.id)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default));
        Ok(adapter)
    }
}
