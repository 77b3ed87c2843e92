pub mod connections;
pub mod sync_logs;
pub mod webhook_events;
pub mod webhooks;
