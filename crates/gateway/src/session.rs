use std::{net::SocketAddr, time::Instant};

use tokio::sync::Mutex;

use crate::registry::ShardId;

/// One connected shard process.
///
/// Calls on a session are handled in order, so `registration` is only
/// contended if a handler is invoked outside the session loop.
#[derive(Debug)]
pub struct ShardSession {
    pub id: u64,
    pub peer: SocketAddr,
    /// The registry entry this session owns, if it has registered.
    pub registration: Mutex<Option<ShardId>>,
    pub connected_at: Instant,
}

impl ShardSession {
    pub fn new(id: u64, peer: SocketAddr) -> Self {
        Self {
            id,
            peer,
            registration: Mutex::new(None),
            connected_at: Instant::now(),
        }
    }
}
