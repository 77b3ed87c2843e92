//! HTTP surface of the synchronization engine.
//!
//! Receives provider webhooks, exposes the Sync Log and connection status,
//! and lets operators trigger a full import or replay a failed webhook event.

pub mod config;
pub mod error;
pub mod handlers;
pub mod query;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
