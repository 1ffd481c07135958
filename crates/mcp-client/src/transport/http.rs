use crate::error::{ClientError, Result};
use crate::transport::{ForwardOutcome, Forwarder};
use crate::ClientConfig;
use async_trait::async_trait;
use mcp_types::{ErrorObject, JsonRpcNotification, JsonRpcRequest, RequestId};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
    Client,
};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

const SESSION_HEADER: &str = "Mcp-Session-Id";
const MAX_ERROR_BODY: usize = 512;

/// Forwards messages as HTTP POSTs to a single fixed endpoint.
pub struct HttpForwarder {
    client: Client,
    endpoint: url::Url,
    timeout: Duration,
    session_id: Arc<Mutex<Option<String>>>,
}

struct RemoteReply {
    content_type: Option<String>,
    body: String,
}

impl HttpForwarder {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let endpoint = config.endpoint()?;
        let headers = default_headers(&config)?;

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(ClientError::ClientSetup)?;

        Ok(Self {
            client,
            endpoint,
            timeout: config.timeout,
            session_id: Arc::new(Mutex::new(None)),
        })
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }

    /// Session issued by the remote server, if any.
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.lock().await.clone()
    }

    async fn post(&self, payload: Vec<u8>) -> Result<RemoteReply> {
        let mut request = self.client.post(self.endpoint.clone()).body(payload);
        if let Some(session_id) = self.session_id.lock().await.as_ref() {
            request = request.header(SESSION_HEADER, session_id.as_str());
        }

        let exchange = async {
            let response = request.send().await?;
            self.remember_session(response.headers()).await;

            let status = response.status();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, content_type, body))
        };

        let (status, content_type, body) = match tokio::time::timeout(self.timeout, exchange).await
        {
            Ok(Ok(parts)) => parts,
            Ok(Err(e)) if e.is_timeout() => return Err(ClientError::Timeout(self.timeout)),
            Ok(Err(e)) => return Err(ClientError::Unreachable(e)),
            Err(_) => return Err(ClientError::Timeout(self.timeout)),
        };

        debug!("Received HTTP {} from {}", status, self.endpoint);

        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: body.trim().chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        Ok(RemoteReply { content_type, body })
    }

    async fn remember_session(&self, headers: &HeaderMap) {
        let Some(issued) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) else {
            return;
        };

        let mut current = self.session_id.lock().await;
        if current.as_deref() != Some(issued) {
            info!("Remote server issued session {}", issued);
            *current = Some(issued.to_string());
        }
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, request: &JsonRpcRequest) -> Result<ForwardOutcome> {
        let payload = serde_json::to_vec(request)?;
        debug!("Forwarding {} (id {}) to {}", request.method, request.id, self.endpoint);

        let reply = self.post(payload).await?;
        interpret_reply(&request.id, reply.content_type.as_deref(), &reply.body)
    }

    async fn notify(&self, notification: &JsonRpcNotification) -> Result<()> {
        let payload = serde_json::to_vec(notification)?;
        debug!("Forwarding notification {} to {}", notification.method, self.endpoint);

        self.post(payload).await?;
        Ok(())
    }
}

fn default_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/event-stream"),
    );

    for (key, value) in &config.headers {
        headers.insert(
            HeaderName::from_str(key)
                .map_err(|e| ClientError::InvalidHeader(format!("name '{}': {}", key, e)))?,
            HeaderValue::from_str(value)
                .map_err(|e| ClientError::InvalidHeader(format!("value for '{}': {}", key, e)))?,
        );
    }

    if let Some(token) = &config.auth_token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ClientError::InvalidHeader(format!("auth token: {}", e)))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    if let Some(user_agent) = &config.user_agent {
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|e| ClientError::InvalidHeader(format!("user agent: {}", e)))?,
        );
    }

    Ok(headers)
}

/// Turn a 2xx body into the outcome for request `id`.
fn interpret_reply(id: &RequestId, content_type: Option<&str>, body: &str) -> Result<ForwardOutcome> {
    let body = body.trim();
    if body.is_empty() {
        // 202 Accepted and friends
        return Ok(ForwardOutcome::Result(json!({})));
    }

    let is_sse = content_type.is_some_and(|ct| ct.starts_with("text/event-stream"))
        || body.starts_with("event:")
        || body.starts_with("data:");

    let value = if is_sse {
        select_sse_payload(id, body)?
    } else {
        serde_json::from_str(body)
            .map_err(|e| ClientError::InvalidResponse(format!("expected JSON body: {}", e)))?
    };

    unwrap_envelope(id, value)
}

/// If `value` is a JSON-RPC response envelope, unwrap it; otherwise treat the
/// whole body as the result.
fn unwrap_envelope(id: &RequestId, value: Value) -> Result<ForwardOutcome> {
    if !is_envelope(&value) {
        return Ok(ForwardOutcome::Result(value));
    }

    let reply_id = value.get("id").and_then(RequestId::from_value);
    if let Some(reply_id) = &reply_id {
        if reply_id != id {
            return Err(ClientError::InvalidResponse(format!(
                "response id {} does not match request id {}",
                reply_id, id
            )));
        }
    }

    if let Some(error) = value.get("error") {
        let error: ErrorObject = serde_json::from_value(error.clone())
            .map_err(|e| ClientError::InvalidResponse(format!("malformed error object: {}", e)))?;
        return Ok(ForwardOutcome::RemoteError(error));
    }

    Ok(ForwardOutcome::Result(
        value.get("result").cloned().unwrap_or(Value::Null),
    ))
}

fn is_envelope(value: &Value) -> bool {
    value.as_object().is_some_and(|object| {
        object.contains_key("id")
            && (object.contains_key("result") || object.contains_key("error"))
    })
}

/// Pick the event that answers `id` out of an SSE body.
///
/// Falls back to the last JSON payload that is not itself a server request or
/// notification. A stream with nothing usable is an invalid response.
fn select_sse_payload(id: &RequestId, text: &str) -> Result<Value> {
    let mut last = None;

    for payload in sse_payloads(text) {
        let value: Value = match serde_json::from_str(&payload) {
            Ok(value) => value,
            Err(e) => {
                debug!("Skipping non-JSON SSE event: {}", e);
                continue;
            }
        };

        if is_envelope(&value) && value.get("id").and_then(RequestId::from_value).as_ref() == Some(id)
        {
            return Ok(value);
        }
        if value.get("method").is_some() {
            debug!("Skipping server-initiated SSE message");
            continue;
        }
        last = Some(value);
    }

    last.ok_or_else(|| {
        ClientError::InvalidResponse(format!("event stream carried no reply for id {}", id))
    })
}

/// Joined `data:` lines of each event, in order.
fn sse_payloads(text: &str) -> Vec<String> {
    let mut events = Vec::new();
    let mut data: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.is_empty() {
            if !data.is_empty() {
                events.push(data.join("\n"));
                data.clear();
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    if !data.is_empty() {
        events.push(data.join("\n"));
    }

    events
}
