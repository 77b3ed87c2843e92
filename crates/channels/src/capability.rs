//! Operations an adapter may declare support for.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Authenticate,
    RefreshToken,
    ListProperties,
    GetProperty,
    ListRoomTypes,
    GetAvailability,
    GetRates,
    ListReservations,
    CreateReservation,
    UpdateReservation,
    CancelReservation,
}

impl Capability {
    pub const ALL: [Capability; 11] = [
        Self::Authenticate,
        Self::RefreshToken,
        Self::ListProperties,
        Self::GetProperty,
        Self::ListRoomTypes,
        Self::GetAvailability,
        Self::GetRates,
        Self::ListReservations,
        Self::CreateReservation,
        Self::UpdateReservation,
        Self::CancelReservation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authenticate => "authenticate",
            Self::RefreshToken => "refresh_token",
            Self::ListProperties => "list_properties",
            Self::GetProperty => "get_property",
            Self::ListRoomTypes => "list_room_types",
            Self::GetAvailability => "get_availability",
            Self::GetRates => "get_rates",
            Self::ListReservations => "list_reservations",
            Self::CreateReservation => "create_reservation",
            Self::UpdateReservation => "update_reservation",
            Self::CancelReservation => "cancel_reservation",
        }
    }

    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of capabilities, stored as a bit mask.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u16);

impl Capabilities {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    pub fn of(capabilities: &[Capability]) -> Self {
        capabilities
            .iter()
            .fold(Self::empty(), |set, c| set.with(*c))
    }

    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_membership() {
        let caps = Capabilities::of(&[Capability::ListProperties, Capability::GetRates]);
        assert!(caps.contains(Capability::GetRates));
        assert!(!caps.contains(Capability::CancelReservation));
        assert_eq!(caps.iter().count(), 2);
    }

    #[test]
    fn empty_set() {
        assert!(Capability::ALL
            .iter()
            .all(|c| !Capabilities::empty().contains(*c)));
    }
}
