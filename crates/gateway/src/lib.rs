//! Gateway: shard registration endpoint, client connection listener and
//! lifecycle orchestration.
//!
//! Lifecycle:
//! 1. Load config (defaults if missing)
//! 2. Connect the account store; nothing is bound if this fails
//! 3. Start the inter-server registration endpoint
//! 4. Bind the client listener (and the optional status endpoint)
//! 5. Serve until the shutdown token fires, then stop in start order
//!
//! Shard registrations made over the inter-server endpoint are owned by the
//! session that made them and disappear when it closes.

pub mod error;
pub mod inter;
pub mod inter_client;
pub mod listener;
pub mod login;
pub mod methods;
pub mod registry;
pub mod server;
pub mod session;
pub mod state;
pub mod status;

pub use {
    error::GatewayError,
    inter::{InterServer, parse_inter_uri},
    inter_client::InterClient,
    listener::{ConnectionHandler, ConnectionHandlerFactory, ConnectionListener},
    login::LoginConnectionFactory,
    registry::{RegisteredShard, ShardDescriptor, ShardId, ShardRegistry},
    server::{
        ConfiguredStore, Gateway, GatewayPhase, RunningGateway, StoreConnector, start_gateway,
    },
    state::GatewayState,
};
