use serde::{Deserialize, Serialize};

use crate::{ProtocolError, encode_line};

/// Error codes reported to clients in [`LoginResponse::error_code`].
///
/// Account state codes map onto this space as `state - 1`, so a blocked
/// account may report any value, including ones listed here.
pub mod login_codes {
    pub const UNKNOWN_ACCOUNT: i32 = 0;
    pub const BAD_PASSWORD: i32 = 1;
    pub const SERVER_REJECTED: i32 = 3;
    pub const OUTDATED_CLIENT: i32 = 5;
    pub const BANNED: i32 = 6;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    #[default]
    Female,
    Male,
}

impl Sex {
    /// Single-character form used by the account store.
    pub fn as_char(self) -> char {
        match self {
            Sex::Female => 'F',
            Sex::Male => 'M',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'F' => Some(Sex::Female),
            'M' => Some(Sex::Male),
            _ => None,
        }
    }
}

/// Credentials presented by a client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub client_version: u32,
    #[serde(default)]
    pub client_type: u8,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("client_version", &self.client_version)
            .field("client_type", &self.client_type)
            .finish()
    }
}

impl LoginRequest {
    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode_line(self)
    }
}

/// Outcome of a login attempt.
///
/// `success` is the only success signal; `error_code` is 0 on success but
/// may also be 0 for a refused account in state 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub error_code: i32,
    pub account_id: i64,
    pub sex: Sex,
}

impl LoginResponse {
    pub fn granted(account_id: i64, sex: Sex) -> Self {
        Self {
            success: true,
            error_code: 0,
            account_id,
            sex,
        }
    }

    pub fn refused(error_code: i32) -> Self {
        Self {
            success: false,
            error_code,
            account_id: 0,
            sex: Sex::default(),
        }
    }

    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode_line(self)
    }
}
