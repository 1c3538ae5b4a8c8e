use std::{sync::Arc, time::Instant};

use rhea_accounts::Authenticator;

use crate::registry::ShardRegistry;

/// Shared runtime state, created once the account store is connected.
pub struct GatewayState {
    /// Server version string.
    pub version: String,
    /// Hostname reported by the status endpoint.
    pub hostname: String,
    /// Live shard processes.
    pub registry: Arc<ShardRegistry>,
    pub authenticator: Arc<Authenticator>,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(registry: Arc<ShardRegistry>, authenticator: Arc<Authenticator>) -> Arc<Self> {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".into());
        Arc::new(Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            hostname,
            registry,
            authenticator,
            started_at: Instant::now(),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
