//! Messaging Runtime Wire Protocol
//!
//! DTOs and routes for endpoint dispatch and presence checks. Payloads ride
//! as JSON values; individual services define their own message enums on
//! top.

use serde::{Deserialize, Serialize};

/// Route for dispatching a message to a named endpoint.
pub const ENDPOINT_ASK: &str = "/rpc/ask";
/// Route prefix for endpoint presence checks (`GET /rpc/check/{name}`).
pub const ENDPOINT_CHECK: &str = "/rpc/check";

/// Header carrying the shared authentication secret.
pub const AUTH_HEADER: &str = "x-engine-auth";

/// A message addressed to a named endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct AskRequest {
    /// Name the target handler was registered under.
    pub endpoint: String,
    /// Service-defined message payload.
    pub payload: serde_json::Value,
}

/// Reply from an endpoint dispatch.
#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub ok: bool,
    /// Handler reply when `ok`.
    pub payload: Option<serde_json::Value>,
    /// Failure description when not `ok`.
    pub error: Option<String>,
}

/// Reply from a presence check.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResponse {
    pub present: bool,
}
