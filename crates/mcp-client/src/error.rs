use mcp_types::{ErrorCode, ErrorObject};
use serde_json::json;
use std::fmt;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug)]
pub enum ClientError {
    /// Connection refused, DNS failure, TLS failure, reset mid-body.
    Unreachable(reqwest::Error),
    /// The local HTTP client could not be built (TLS backend, resolver).
    ClientSetup(reqwest::Error),
    /// The endpoint answered with a non-2xx status.
    Status { status: u16, body: String },
    Timeout(Duration),
    InvalidResponse(String),
    InvalidUrl(String),
    InvalidHeader(String),
    Serialization(serde_json::Error),
}

impl ClientError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ClientError::Timeout(_) => ErrorCode::Timeout,
            ClientError::InvalidResponse(_) => ErrorCode::InvalidResponse,
            _ => ErrorCode::RemoteUnavailable,
        }
    }

    /// Protocol-level error reported to the local client.
    pub fn error_object(&self) -> ErrorObject {
        let error = ErrorObject::new(self.code(), self.to_string());
        match self {
            ClientError::Status { status, .. } => error.with_data(json!({ "status": status })),
            ClientError::Timeout(after) => {
                error.with_data(json!({ "timeout_ms": after.as_millis() as u64 }))
            }
            _ => error,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Unreachable(err) => write!(f, "Remote server unreachable: {}", err),
            ClientError::ClientSetup(err) => write!(f, "Failed to build HTTP client: {}", err),
            ClientError::Status { status, body } if body.is_empty() => {
                write!(f, "Remote server returned HTTP {}", status)
            }
            ClientError::Status { status, body } => {
                write!(f, "Remote server returned HTTP {}: {}", status, body)
            }
            ClientError::Timeout(after) => {
                write!(f, "Remote server did not answer within {:?}", after)
            }
            ClientError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            ClientError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),
            ClientError::InvalidHeader(msg) => write!(f, "Invalid header: {}", msg),
            ClientError::Serialization(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Unreachable(err) | ClientError::ClientSetup(err) => Some(err),
            ClientError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_maps_to_remote_unavailable() {
        let err = ClientError::Status {
            status: 503,
            body: String::new(),
        };
        let object = err.error_object();

        assert_eq!(object.bridge_code(), Some(ErrorCode::RemoteUnavailable));
        assert_eq!(object.data, Some(json!({ "status": 503 })));
        assert_eq!(object.message, "Remote server returned HTTP 503");
    }

    #[test]
    fn test_timeout_has_distinct_code() {
        let object = ClientError::Timeout(Duration::from_millis(250)).error_object();
        assert_eq!(object.bridge_code(), Some(ErrorCode::Timeout));
        assert_eq!(object.data, Some(json!({ "timeout_ms": 250 })));
    }

    #[test]
    fn test_client_setup_is_not_reported_as_unreachable() {
        let source = reqwest::Client::new()
            .get("not a url")
            .build()
            .expect_err("relative URL");
        let err = ClientError::ClientSetup(source);

        assert!(err.to_string().starts_with("Failed to build HTTP client"));
        assert!(!err.to_string().contains("unreachable"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_invalid_response_code() {
        let err = ClientError::InvalidResponse("expected JSON".into());
        assert_eq!(err.code(), ErrorCode::InvalidResponse);
    }
}
