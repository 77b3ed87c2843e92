//! Shared response envelope types for API handlers.
//!
//! Operator endpoints answer with a `{ "data": ... }` envelope. Webhook
//! acknowledgements are the exception: providers get a flat receipt.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
