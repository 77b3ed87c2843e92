//! Concrete provider adapters.

pub mod beds24;
pub mod hub;

pub use beds24::Beds24Adapter;
pub use hub::HubAdapter;
