use std::net::SocketAddr;

use rhea_accounts::AccountError;

/// Startup failures. Per-call failures never surface here; they are turned
/// into structured responses at the session boundary.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to connect to account store: {0}")]
    StoreConnect(#[source] AccountError),
    #[error("invalid inter-server uri {uri:?}: {reason}")]
    InvalidInterUri { uri: String, reason: String },
    #[error("failed to bind inter-server endpoint {addr}: {source}")]
    InterBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to bind client listener on {addr}: {source}")]
    ListenerBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to bind status endpoint on {addr}: {source}")]
    StatusBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
