//! Provider adapters for the synchronization engine.
//!
//! Every provider implements [`adapter::ChannelAdapter`] and declares the
//! subset of operations it supports through [`capability::Capabilities`].
//! Adapters translate provider payloads into the canonical DTOs in [`dto`],
//! keeping the untouched provider object in each DTO's `raw` field.
//!
//! Adapters are built per connection from a [`http::ConnectionContext`]
//! carrying credentials, the base URL, the connection's shared
//! [`rate_limit::SlidingWindowLimiter`] and its endpoint-variant memory.

pub mod adapter;
pub mod capability;
pub mod dto;
pub mod http;
pub mod normalize;
pub mod providers;
pub mod rate_limit;
pub mod registry;
pub mod webhook;

pub use adapter::ChannelAdapter;
pub use capability::{Capabilities, Capability};
pub use http::{ConnectionContext, EndpointVariant, VariantMemory};
pub use rate_limit::{RateLimiterRegistry, SlidingWindowLimiter};
pub use registry::{build_adapter, Provider};
