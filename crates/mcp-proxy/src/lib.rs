//! MCP Proxy - the stdio to HTTP bridge loop
//!
//! Reads frames from the local client, forwards each request through a
//! [`mcp_client::Forwarder`], and writes the correlated replies back.

pub mod bridge;
pub mod error;
pub mod pending;

pub use bridge::{Bridge, BridgeConfig, BridgeSummary};
pub use error::{ProxyError, Result};
pub use pending::{PendingRequest, PendingRequests};
