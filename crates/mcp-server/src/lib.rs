//! MCP Server - the stdio side of the bridge
//!
//! Local MCP clients (IDEs, editor tooling) talk to the bridge over
//! newline-delimited JSON-RPC on stdin/stdout. This crate turns that byte
//! stream into [`Frame`]s and writes responses back one line at a time.

pub mod error;
pub mod transport;

pub use error::{Result, ServerError};
pub use transport::{decode_frame, stdio, Frame, FrameReader, FrameWriter};
