//! Wire types shared by the account gateway, shard processes and clients.
//!
//! Two exchanges live here:
//! - the inter-server registration RPC (line-delimited JSON request/response
//!   frames, one session per shard connection)
//! - the client login exchange (`LoginRequest` → `LoginResponse`)

pub mod login;

use serde::{Deserialize, Serialize};

pub use login::{LoginRequest, LoginResponse, Sex, login_codes};

/// Version of the registration frame format.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest accepted frame, in bytes, excluding the trailing newline.
/// Readers stop buffering and close the connection past this length.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Fully qualified registration method names.
pub mod methods {
    pub const REGISTER: &str = "CharServer.register";
    pub const UNREGISTER: &str = "CharServer.unregister";
    pub const LIST: &str = "CharServer.list";
}

/// Error codes carried in [`ErrorShape::code`].
pub mod error_codes {
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const UNKNOWN_METHOD: &str = "UNKNOWN_METHOD";
    pub const UNAVAILABLE: &str = "UNAVAILABLE";
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

// ── Frames ───────────────────────────────────────────────────────────────────

/// A call from a shard process to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RequestFrame {
    pub fn new(id: u64, method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line)?)
    }

    /// Serialize to a single line, newline included.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode_line(self)
    }
}

/// Structured error returned instead of a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
}

impl ErrorShape {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Reply to a [`RequestFrame`], matched by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: u64,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

impl ResponseFrame {
    pub fn ok(id: u64, payload: serde_json::Value) -> Self {
        Self {
            id,
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(id: u64, error: ErrorShape) -> Self {
        Self {
            id,
            ok: false,
            payload: None,
            error: Some(error),
        }
    }

    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode_line(self)
    }
}

/// Parameters of `CharServer.register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterParams {
    pub name: String,
    pub address: String,
    pub port: u16,
}

pub(crate) fn encode_line<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_params_default_to_null() {
        let frame = RequestFrame::decode(r#"{"id":7,"method":"CharServer.unregister"}"#).unwrap();
        assert_eq!(frame.id, 7);
        assert_eq!(frame.method, methods::UNREGISTER);
        assert!(frame.params.is_null());
    }

    #[test]
    fn error_response_omits_payload() {
        let frame = ResponseFrame::err(3, ErrorShape::new(error_codes::UNKNOWN_METHOD, "nope"));
        let line = frame.encode().unwrap();
        assert!(line.ends_with('\n'));
        assert!(!line.contains("payload"));
        assert_eq!(ResponseFrame::decode(line.trim_end()).unwrap(), frame);
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            RequestFrame::decode("{not json"),
            Err(ProtocolError::Malformed(_))
        ));
    }
}
