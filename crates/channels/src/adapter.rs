//! The adapter contract.

use async_trait::async_trait;
use staysync_core::cadence::DateRange;
use staysync_core::sync_error::{SyncError, SyncResult};

use crate::capability::{Capabilities, Capability};
use crate::dto::{
    DayDto, Page, Pagination, PropertyDto, RateDto, ReservationDto, ReservationFilter,
    ReservationRequest, RoomTypeDto, TokenGrant,
};

/// Error returned by operations an adapter does not implement.
pub fn unsupported(provider: &str, capability: Capability) -> SyncError {
    SyncError::validation(format!("{provider} does not support {capability}"))
}

/// One provider's API translated into canonical DTOs.
///
/// Every operation returns a [`SyncResult`]; nothing panics across this
/// boundary. Operations outside [`ChannelAdapter::capabilities`] keep the
/// default body, which returns a `VALIDATION` error. Callers check
/// [`ChannelAdapter::supports`] first and skip absent capabilities.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Provider slug, as stored on the connection.
    fn provider(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(capability)
    }

    /// Validate the connection's credentials against the provider.
    async fn authenticate(&self) -> SyncResult<()> {
        Err(unsupported(self.provider(), Capability::Authenticate))
    }

    /// Exchange a refresh token for a new access token.
    async fn refresh_token(&self, _refresh_token: &str) -> SyncResult<TokenGrant> {
        Err(unsupported(self.provider(), Capability::RefreshToken))
    }

    async fn list_properties(&self, _page: Pagination) -> SyncResult<Page<PropertyDto>> {
        Err(unsupported(self.provider(), Capability::ListProperties))
    }

    async fn get_property(&self, _external_id: &str) -> SyncResult<PropertyDto> {
        Err(unsupported(self.provider(), Capability::GetProperty))
    }

    async fn list_room_types(&self, _property_external_id: &str) -> SyncResult<Vec<RoomTypeDto>> {
        Err(unsupported(self.provider(), Capability::ListRoomTypes))
    }

    async fn get_availability(
        &self,
        _property_external_id: &str,
        _room_external_id: &str,
        _range: DateRange,
    ) -> SyncResult<Vec<DayDto>> {
        Err(unsupported(self.provider(), Capability::GetAvailability))
    }

    async fn get_rates(
        &self,
        _property_external_id: &str,
        _room_external_id: &str,
        _range: DateRange,
    ) -> SyncResult<Vec<RateDto>> {
        Err(unsupported(self.provider(), Capability::GetRates))
    }

    async fn list_reservations(
        &self,
        _filter: &ReservationFilter,
    ) -> SyncResult<Vec<ReservationDto>> {
        Err(unsupported(self.provider(), Capability::ListReservations))
    }

    async fn create_reservation(
        &self,
        _request: &ReservationRequest,
    ) -> SyncResult<ReservationDto> {
        Err(unsupported(self.provider(), Capability::CreateReservation))
    }

    async fn update_reservation(
        &self,
        _external_id: &str,
        _request: &ReservationRequest,
    ) -> SyncResult<ReservationDto> {
        Err(unsupported(self.provider(), Capability::UpdateReservation))
    }

    async fn cancel_reservation(&self, _external_id: &str) -> SyncResult<()> {
        Err(unsupported(self.provider(), Capability::CancelReservation))
    }
}

/// Fetch every page of properties.
pub async fn list_all_properties(adapter: &dyn ChannelAdapter) -> SyncResult<Vec<PropertyDto>> {
    let mut all = Vec::new();
    let mut cursor = Some(Pagination::default());
    while let Some(page) = cursor {
        let result = adapter.list_properties(page).await?;
        let empty = result.items.is_empty();
        all.extend(result.items);
        cursor = if empty { None } else { result.next };
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use staysync_core::sync_error::SyncErrorKind;

    use super::*;

    struct ListingOnly {
        pages: u32,
    }

    #[async_trait]
    impl ChannelAdapter for ListingOnly {
        fn provider(&self) -> &'static str {
            "listing_only"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::of(&[Capability::ListProperties])
        }

        async fn list_properties(&self, page: Pagination) -> SyncResult<Page<PropertyDto>> {
            let item = PropertyDto {
                external_id: format!("P{}", page.page),
                name: "Villa".into(),
                ..Default::default()
            };
            Ok(Page {
                items: vec![item],
                next: (page.page < self.pages).then(|| page.next()),
            })
        }
    }

    #[tokio::test]
    async fn missing_capability_is_validation_error() {
        let adapter = ListingOnly { pages: 1 };
        assert!(!adapter.supports(Capability::CancelReservation));
        let err = adapter.cancel_reservation("B1").await.unwrap_err();
        assert_matches!(err.kind, SyncErrorKind::Validation);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn list_all_follows_cursor() {
        let adapter = ListingOnly { pages: 3 };
        let all = list_all_properties(&adapter).await.unwrap();
        let ids: Vec<_> = all.iter().map(|p| p.external_id.as_str()).collect();
        assert_eq!(ids, ["P1", "P2", "P3"]);
    }
}
