//! MCP Types - JSON-RPC envelopes spoken on the bridge's stdio side
//!
//! The bridge never looks inside `params` or `result`; it only needs enough
//! structure to correlate a request with its response and to report errors
//! in a shape the local client can parse.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

/// Correlation identifier shared by a request and its response.
///
/// Numbers are kept as written, so ids beyond `i64` or with a fraction are
/// echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(Number),
    String(String),
}

impl RequestId {
    /// Best-effort extraction of an id from an arbitrary JSON value.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(RequestId::Number(n.clone())),
            Value::String(s) => Some(RequestId::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Number(id.into())
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId::String(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Response line written back to the local client.
///
/// Field order here is the wire order: `jsonrpc` (when echoed), `id`, then
/// exactly one of `result` / `error`. `id` is always written, as `null` when
/// the originating request could not be identified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl JsonRpcResponse {
    pub fn success(request: &JsonRpcRequest, result: Value) -> Self {
        Self {
            jsonrpc: request.jsonrpc.clone(),
            id: Some(request.id.clone()),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(jsonrpc: Option<String>, id: Option<RequestId>, error: ErrorObject) -> Self {
        Self {
            jsonrpc,
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Error codes reported on the stdio side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    RemoteUnavailable,
    Timeout,
    InvalidResponse,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ParseError => "parse_error",
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::RemoteUnavailable => "remote_unavailable",
            ErrorCode::Timeout => "timeout",
            ErrorCode::InvalidResponse => "invalid_response",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error payload of a response.
///
/// `code` is kept as raw JSON so that error objects returned by the remote
/// server (usually numeric JSON-RPC codes) pass through untouched, while the
/// bridge's own errors use the string codes of [`ErrorCode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: Value,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: Value::String(code.as_str().to_string()),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// The bridge error code, if this error originated in the bridge.
    pub fn bridge_code(&self) -> Option<ErrorCode> {
        serde_json::from_value(self.code.clone()).ok()
    }
}

/// A decoded input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl Inbound {
    /// Classify a parsed JSON value as a request or notification.
    ///
    /// Rejections keep whatever id and `jsonrpc` tag could be recovered so the
    /// error reply can still be correlated.
    pub fn from_value(value: Value) -> Result<Self, MalformedMessage> {
        let jsonrpc = value
            .get("jsonrpc")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self::classify(value).map_err(|mut malformed| {
            malformed.jsonrpc = jsonrpc;
            malformed
        })
    }

    fn classify(value: Value) -> Result<Self, MalformedMessage> {
        let id = value.get("id").and_then(RequestId::from_value);

        let Some(object) = value.as_object() else {
            return Err(MalformedMessage::invalid_request(None, "message must be a JSON object"));
        };

        match object.get("method") {
            Some(Value::String(_)) => {}
            Some(_) => {
                return Err(MalformedMessage::invalid_request(id, "method must be a string"));
            }
            None => {
                return Err(MalformedMessage::invalid_request(id, "missing method field"));
            }
        }

        let raw_id = object.get("id").cloned();
        match raw_id {
            None => serde_json::from_value(value)
                .map(Inbound::Notification)
                .map_err(|e| MalformedMessage::invalid_request(None, e.to_string())),
            Some(raw) if id.is_none() => Err(MalformedMessage::invalid_request(
                None,
                format!("id must be a number or a string, got {}", raw),
            )),
            Some(_) => serde_json::from_value(value)
                .map(Inbound::Request)
                .map_err(|e| MalformedMessage::invalid_request(id, e.to_string())),
        }
    }

    pub fn method(&self) -> &str {
        match self {
            Inbound::Request(request) => &request.method,
            Inbound::Notification(notification) => &notification.method,
        }
    }
}

/// An input line that could not be turned into a message.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedMessage {
    pub id: Option<RequestId>,
    pub jsonrpc: Option<String>,
    pub error: ErrorObject,
}

impl MalformedMessage {
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self {
            id: None,
            jsonrpc: None,
            error: ErrorObject::new(ErrorCode::ParseError, "Parse error")
                .with_data(Value::String(detail.into())),
        }
    }

    pub fn invalid_request(id: Option<RequestId>, detail: impl Into<String>) -> Self {
        Self {
            id,
            jsonrpc: None,
            error: ErrorObject::new(ErrorCode::InvalidRequest, "Invalid request")
                .with_data(Value::String(detail.into())),
        }
    }

    pub fn into_response(self) -> JsonRpcResponse {
        JsonRpcResponse::failure(self.jsonrpc, self.id, self.error)
    }
}

impl fmt::Display for MalformedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error.code, self.error.message)?;
        if let Some(Value::String(detail)) = &self.error.data {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}
