//! Domain logic for the channel-manager synchronization engine.
//!
//! This crate has no internal dependencies so every other crate (adapters,
//! persistence, engine, HTTP) can share the same vocabulary:
//!
//! - [`sync_error`]: the structured error taxonomy returned across the
//!   adapter boundary.
//! - [`connection`]: connection lifecycle state machine.
//! - [`cadence`]: sync kinds, their cadences and date horizons.
//! - [`availability`]: availability sources, booking statuses and write
//!   precedence.
//! - [`reconcile`]: staging-hash reconcile decisions and run counters.

pub mod availability;
pub mod cadence;
pub mod connection;
pub mod error;
pub mod hashing;
pub mod pagination;
pub mod reconcile;
pub mod sync_error;
pub mod types;
