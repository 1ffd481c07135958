//! Transport seam between the bridge loop and the remote endpoint
//!
//! The bridge only needs "send this request, give me the correlated answer".
//! [`Forwarder`] captures exactly that, so the loop can be driven by the real
//! HTTP transport or by a scripted one in tests.

use crate::error::Result;
use async_trait::async_trait;
use mcp_types::{ErrorObject, JsonRpcNotification, JsonRpcRequest};
use serde_json::Value;

pub mod http;

pub use http::HttpForwarder;

/// What the remote endpoint answered for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardOutcome {
    /// Body to place in the `result` field of the response.
    Result(Value),
    /// The remote answered with its own JSON-RPC error object.
    RemoteError(ErrorObject),
}

#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Forward a request and wait for its correlated reply.
    async fn forward(&self, request: &JsonRpcRequest) -> Result<ForwardOutcome>;

    /// Deliver a notification. Any reply body is dropped.
    async fn notify(&self, notification: &JsonRpcNotification) -> Result<()>;
}
