//! MCP Client - forwards stdio requests to a remote MCP endpoint over HTTP
//!
//! This crate owns the outbound half of the bridge: the immutable connection
//! settings ([`ClientConfig`]), the [`Forwarder`] seam the bridge talks to,
//! and the reqwest-backed [`HttpForwarder`] used in production.

pub mod error;
pub mod transport;

pub use error::{ClientError, Result};
pub use transport::{ForwardOutcome, Forwarder, HttpForwarder};

use std::collections::HashMap;
use std::time::Duration;

/// Default deadline for a single forwarded call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection state shared by every forwarded request.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub auth_token: Option<String>,
    pub headers: HashMap<String, String>,
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub allow_http: bool,
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            auth_token: None,
            headers: HashMap::new(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: Some(concat!("mcp-bridge/", env!("CARGO_PKG_VERSION")).to_string()),
            allow_http: false,
        }
    }

    /// Bearer token sent as `Authorization: Bearer <token>`.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn allow_http(mut self) -> Self {
        self.allow_http = true;
        self
    }

    /// Parse the endpoint and enforce the scheme policy.
    pub fn endpoint(&self) -> Result<url::Url> {
        let url = url::Url::parse(&self.server_url)
            .map_err(|e| ClientError::InvalidUrl(format!("'{}': {}", self.server_url, e)))?;

        match url.scheme() {
            "https" => Ok(url),
            "http" if self.allow_http => Ok(url),
            "http" => Err(ClientError::InvalidUrl(
                "HTTPS required. Use --allow-http for HTTP URLs in trusted networks".to_string(),
            )),
            scheme => Err(ClientError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                scheme
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config() {
        let config = ClientConfig::new("http://localhost:8080")
            .with_auth_token("secret")
            .with_header("X-Tenant", "docs")
            .with_timeout(Duration::from_secs(60))
            .allow_http();

        assert_eq!(config.server_url, "http://localhost:8080");
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.headers.get("X-Tenant"), Some(&"docs".to_string()));
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.allow_http);
    }

    #[test]
    fn test_endpoint_scheme_policy() {
        assert!(ClientConfig::new("https://example.com/mcp").endpoint().is_ok());
        assert!(ClientConfig::new("http://example.com/mcp").endpoint().is_err());
        assert!(ClientConfig::new("http://example.com/mcp")
            .allow_http()
            .endpoint()
            .is_ok());
        assert!(ClientConfig::new("ftp://example.com").endpoint().is_err());
        assert!(ClientConfig::new("not a url").endpoint().is_err());
    }
}
