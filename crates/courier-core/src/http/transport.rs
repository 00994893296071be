//! The transport seam
//!
//! The pipeline never speaks HTTP itself. It hands an encoded
//! [`RequestDescriptor`] to a [`Transport`] and classifies whatever comes back.

use crate::http::error::TransportError;
use crate::types::{RequestDescriptor, TransportResponse};
use async_trait::async_trait;
use serde_json::Value;

/// Sends encoded requests
///
/// Implementations return every response the server produced, whatever its
/// status, and fail only when no usable response was obtained.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: RequestDescriptor) -> Result<TransportResponse, TransportError>;
}

/// Parse a response body: JSON if possible, else text, `Null` when empty
pub fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
