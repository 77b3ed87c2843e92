//! Sync kinds, their cadences, and date horizons.
//!
//! Each data category is synced and written independently, so a kind is
//! described by the set of categories it touches plus how far ahead it looks.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::Days;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Day;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Short-horizon pricing runs every 15 minutes.
pub const SHORT_PRICING_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Long-horizon pricing runs once a day.
pub const LONG_PRICING_INTERVAL: Duration = Duration::from_secs(24 * 3600);

/// Availability backup reconciliation runs every two days.
pub const AVAILABILITY_BACKUP_INTERVAL: Duration = Duration::from_secs(48 * 3600);

/// Default short pricing window in days.
pub const DEFAULT_SHORT_HORIZON_DAYS: u32 = 30;

/// Default full horizon in days (about 18 months).
pub const DEFAULT_LONG_HORIZON_DAYS: u32 = 548;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// A data category synced and written independently of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Property,
    RoomType,
    Availability,
    Rate,
    Reservation,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Property => "property",
            Self::RoomType => "room_type",
            Self::Availability => "availability",
            Self::Rate => "rate",
            Self::Reservation => "reservation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SyncKind
// ---------------------------------------------------------------------------

/// What a single run of the engine does for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    /// User-triggered import of everything over the full horizon.
    FullImport,
    /// Metadata and reservations, driven by the connection's own `sync_interval`.
    Incremental,
    /// Rates over the short window, every 15 minutes.
    ShortHorizonPricing,
    /// Rates over the full horizon, once a day.
    LongHorizonPricing,
    /// Availability over the full horizon, every two days, to correct webhook drift.
    AvailabilityBackup,
}

impl SyncKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullImport => "full_import",
            Self::Incremental => "incremental",
            Self::ShortHorizonPricing => "short_horizon_pricing",
            Self::LongHorizonPricing => "long_horizon_pricing",
            Self::AvailabilityBackup => "availability_backup",
        }
    }

    /// Fixed cadence, or `None` for kinds that are triggered otherwise.
    pub fn cadence(self) -> Option<Duration> {
        match self {
            Self::ShortHorizonPricing => Some(SHORT_PRICING_INTERVAL),
            Self::LongHorizonPricing => Some(LONG_PRICING_INTERVAL),
            Self::AvailabilityBackup => Some(AVAILABILITY_BACKUP_INTERVAL),
            Self::FullImport | Self::Incremental => None,
        }
    }

    /// Kinds the scheduler drives on a fixed cadence.
    pub fn scheduled() -> [SyncKind; 3] {
        [
            Self::ShortHorizonPricing,
            Self::LongHorizonPricing,
            Self::AvailabilityBackup,
        ]
    }

    /// Categories this kind fetches and writes.
    pub fn categories(self) -> &'static [Category] {
        use Category::*;
        match self {
            Self::FullImport => &[Property, RoomType, Availability, Rate, Reservation],
            Self::Incremental => &[Property, RoomType, Reservation],
            Self::ShortHorizonPricing | Self::LongHorizonPricing => &[Rate],
            Self::AvailabilityBackup => &[Availability],
        }
    }

    pub fn touches(self, category: Category) -> bool {
        self.categories().contains(&category)
    }

    /// Whether the run discovers properties and rooms from the provider, as
    /// opposed to working from rooms already staged.
    pub fn discovers_inventory(self) -> bool {
        self.touches(Category::Property)
    }

    /// Number of days ahead this kind looks.
    pub fn horizon_days(self, horizons: &Horizons) -> u32 {
        match self {
            Self::ShortHorizonPricing => horizons.short_days,
            _ => horizons.long_days,
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full_import" => Ok(Self::FullImport),
            "incremental" => Ok(Self::Incremental),
            "short_horizon_pricing" => Ok(Self::ShortHorizonPricing),
            "long_horizon_pricing" => Ok(Self::LongHorizonPricing),
            "availability_backup" => Ok(Self::AvailabilityBackup),
            other => Err(CoreError::Validation(format!("Unknown sync kind: {other}"))),
        }
    }
}

/// Configured look-ahead windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Horizons {
    pub short_days: u32,
    pub long_days: u32,
}

impl Default for Horizons {
    fn default() -> Self {
        Self {
            short_days: DEFAULT_SHORT_HORIZON_DAYS,
            long_days: DEFAULT_LONG_HORIZON_DAYS,
        }
    }
}

// ---------------------------------------------------------------------------
// DateRange
// ---------------------------------------------------------------------------

/// Half-open range of calendar days `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Day,
    pub end: Day,
}

impl DateRange {
    /// Build a range, rejecting `end < start`.
    pub fn new(start: Day, end: Day) -> Result<Self, CoreError> {
        if end < start {
            return Err(CoreError::Validation(format!(
                "Invalid date range: {start} .. {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// `days` days starting at `today`.
    pub fn for_horizon(today: Day, days: u32) -> Self {
        let end = today
            .checked_add_days(Days::new(u64::from(days)))
            .unwrap_or(Day::MAX);
        Self { start: today, end }
    }

    /// The nights of a stay: arrival inclusive, departure exclusive.
    ///
    /// A same-day stay (arrival == departure) still occupies the arrival day.
    pub fn nights(arrival: Day, departure: Day) -> Result<Self, CoreError> {
        if departure < arrival {
            return Err(CoreError::Validation(format!(
                "Departure {departure} is before arrival {arrival}"
            )));
        }
        let end = if departure == arrival {
            arrival.succ_opt().unwrap_or(arrival)
        } else {
            departure
        };
        Ok(Self {
            start: arrival,
            end,
        })
    }

    /// Last day in the range (inclusive), used by providers with closed ranges.
    pub fn last_day(&self) -> Day {
        self.end.pred_opt().filter(|d| *d >= self.start).unwrap_or(self.start)
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, day: Day) -> bool {
        day >= self.start && day < self.end
    }

    /// Iterate over every day in the range.
    pub fn days(&self) -> impl Iterator<Item = Day> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d < end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> Day {
        s.parse().unwrap()
    }

    #[test]
    fn pricing_kinds_only_touch_rates() {
        assert_eq!(SyncKind::ShortHorizonPricing.categories(), &[Category::Rate]);
        assert!(!SyncKind::LongHorizonPricing.touches(Category::Availability));
    }

    #[test]
    fn backup_only_touches_availability() {
        assert_eq!(
            SyncKind::AvailabilityBackup.categories(),
            &[Category::Availability]
        );
        assert!(!SyncKind::AvailabilityBackup.discovers_inventory());
    }

    #[test]
    fn full_import_touches_everything() {
        assert_eq!(SyncKind::FullImport.categories().len(), 5);
        assert!(SyncKind::FullImport.discovers_inventory());
        assert!(SyncKind::FullImport.cadence().is_none());
    }

    #[test]
    fn cadences() {
        assert_eq!(
            SyncKind::ShortHorizonPricing.cadence(),
            Some(Duration::from_secs(900))
        );
        assert_eq!(
            SyncKind::AvailabilityBackup.cadence(),
            Some(Duration::from_secs(172_800))
        );
    }

    #[test]
    fn horizon_selection() {
        let horizons = Horizons::default();
        assert_eq!(SyncKind::ShortHorizonPricing.horizon_days(&horizons), 30);
        assert_eq!(SyncKind::LongHorizonPricing.horizon_days(&horizons), 548);
        assert_eq!(SyncKind::AvailabilityBackup.horizon_days(&horizons), 548);
    }

    #[test]
    fn kind_string_round_trip() {
        for kind in [
            SyncKind::FullImport,
            SyncKind::Incremental,
            SyncKind::ShortHorizonPricing,
            SyncKind::LongHorizonPricing,
            SyncKind::AvailabilityBackup,
        ] {
            assert_eq!(kind.as_str().parse::<SyncKind>().unwrap(), kind);
        }
    }

    #[test]
    fn nights_excludes_departure() {
        let range = DateRange::nights(day("2025-12-30"), day("2025-12-31")).unwrap();
        let days: Vec<Day> = range.days().collect();
        assert_eq!(days, vec![day("2025-12-30")]);
    }

    #[test]
    fn same_day_stay_occupies_arrival() {
        let range = DateRange::nights(day("2025-06-01"), day("2025-06-01")).unwrap();
        assert_eq!(range.len_days(), 1);
    }

    #[test]
    fn nights_rejects_inverted_stay() {
        assert!(DateRange::nights(day("2025-06-02"), day("2025-06-01")).is_err());
    }

    #[test]
    fn horizon_range_spans_days() {
        let range = DateRange::for_horizon(day("2025-01-30"), 3);
        assert_eq!(range.end, day("2025-02-02"));
        assert_eq!(range.days().count(), 3);
        assert_eq!(range.last_day(), day("2025-02-01"));
        assert!(range.contains(day("2025-01-31")));
        assert!(!range.contains(day("2025-02-02")));
    }

    #[test]
    fn new_rejects_inverted_range() {
        assert!(DateRange::new(day("2025-01-02"), day("2025-01-01")).is_err());
        assert!(DateRange::new(day("2025-01-01"), day("2025-01-01"))
            .unwrap()
            .is_empty());
    }
}
