use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};

use {
    serde::{Deserialize, Serialize},
    tokio::sync::RwLock,
    tracing::{info, warn},
};

/// Network location a shard process announces at registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardDescriptor {
    pub name: String,
    pub address: String,
    pub port: u16,
}

impl ShardDescriptor {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
        }
    }
}

/// Identity of one registration. Two registrations of the same descriptor
/// get distinct ids.
pub type ShardId = u64;

/// A live registry entry.
#[derive(Debug, Clone)]
pub struct RegisteredShard {
    pub id: ShardId,
    pub descriptor: ShardDescriptor,
    pub registered_at: Instant,
}

/// Ordered set of live shards.
///
/// All mutations take the single write lock, so they are totally ordered and
/// a snapshot always reflects some complete prior state.
pub struct ShardRegistry {
    shards: RwLock<Vec<RegisteredShard>>,
    next_id: AtomicU64,
}

impl Default for ShardRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardRegistry {
    pub fn new() -> Self {
        Self {
            shards: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append `descriptor` to the live set. Never rejects; a name that is
    /// already registered is kept alongside the new entry.
    pub async fn register(&self, descriptor: ShardDescriptor) -> ShardId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut shards = self.shards.write().await;
        if shards.iter().any(|s| s.descriptor.name == descriptor.name) {
            warn!(name = %descriptor.name, "shard name already registered");
        }
        info!(
            name = %descriptor.name,
            address = %descriptor.address,
            port = descriptor.port,
            "shard registered"
        );
        shards.push(RegisteredShard {
            id,
            descriptor,
            registered_at: Instant::now(),
        });
        id
    }

    /// Replace the descriptor of an existing registration in place.
    /// Returns false if `id` is no longer registered.
    pub async fn reregister(&self, id: ShardId, descriptor: ShardDescriptor) -> bool {
        let mut shards = self.shards.write().await;
        let Some(entry) = shards.iter_mut().find(|s| s.id == id) else {
            return false;
        };
        info!(
            name = %descriptor.name,
            address = %descriptor.address,
            port = descriptor.port,
            previous = %entry.descriptor.name,
            "shard re-registered"
        );
        entry.descriptor = descriptor;
        true
    }

    /// Remove a registration. Unknown ids are ignored.
    pub async fn unregister(&self, id: ShardId) -> Option<ShardDescriptor> {
        let mut shards = self.shards.write().await;
        let pos = shards.iter().position(|s| s.id == id)?;
        let removed = shards.remove(pos);
        info!(name = %removed.descriptor.name, "shard unregistered");
        Some(removed.descriptor)
    }

    /// Descriptors in registration order.
    pub async fn snapshot(&self) -> Vec<ShardDescriptor> {
        self.shards
            .read()
            .await
            .iter()
            .map(|s| s.descriptor.clone())
            .collect()
    }

    pub async fn entries(&self) -> Vec<RegisteredShard> {
        self.shards.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.shards.read().await.len()
    }
}
