//! The synchronization engine.
//!
//! Pulls inventory, availability, rates and reservations from provider
//! adapters on independent cadences, reconciles them into the canonical
//! store through staging tables and mappings, applies webhook booking events
//! as provisional availability mutations, and records every operation in the
//! append-only Sync Log.
//!
//! All persistence goes through [`store::SyncStore`], so the engine runs
//! against PostgreSQL in production and an in-memory store in tests.

pub mod config;
pub mod error;
pub mod mapping;
pub mod runner;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod sync_log;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod webhook;

pub use config::EngineConfig;
pub use mapping::MappingEngine;
pub use runner::{RunOutcome, RunSummary, SkipReason, StartOutcome, SyncRunner};
pub use scheduler::Scheduler;
pub use source::{AdapterSource, HttpAdapterSource};
pub use store::{PgStore, SyncStore};
pub use webhook::{WebhookOutcome, WebhookProcessor, WebhookReceipt};
