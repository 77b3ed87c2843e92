//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod availability_repo;
pub mod booking_repo;
pub mod connection_repo;
pub mod mapping_repo;
pub mod property_repo;
pub mod staging_repo;
pub mod sync_lease_repo;
pub mod sync_log_repo;
pub mod unit_repo;
pub mod webhook_event_repo;

pub use availability_repo::AvailabilityRepo;
pub use booking_repo::BookingRepo;
pub use connection_repo::ConnectionRepo;
pub use mapping_repo::MappingRepo;
pub use property_repo::PropertyRepo;
pub use staging_repo::StagingRepo;
pub use sync_lease_repo::SyncLeaseRepo;
pub use sync_log_repo::SyncLogRepo;
pub use unit_repo::UnitRepo;
pub use webhook_event_repo::WebhookEventRepo;
