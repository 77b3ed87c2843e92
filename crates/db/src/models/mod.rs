//! Row models and write DTOs.
//!
//! Each submodule contains:
//! - `FromRow` + `Serialize` structs matching database rows
//! - plain write structs consumed by the repositories

pub mod connection;
pub mod inventory;
pub mod mapping;
pub mod staging;
pub mod sync_log;
pub mod webhook_event;
