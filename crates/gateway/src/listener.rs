use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    tokio::net::{TcpListener, TcpStream},
    tokio_util::{sync::CancellationToken, task::TaskTracker},
    tracing::{debug, info, warn},
};

use crate::error::GatewayError;

/// Pause after a failed accept so a persistent error (e.g. fd exhaustion)
/// does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Owns one accepted client connection and speaks its protocol.
#[async_trait]
pub trait ConnectionHandler: Send {
    /// Run until the peer disconnects. `shutdown` fires when the gateway
    /// stops; handlers should finish the exchange in progress and return.
    async fn run(self: Box<Self>, shutdown: CancellationToken);
}

/// Builds a handler for every accepted connection.
pub trait ConnectionHandlerFactory: Send + Sync {
    fn create_handler(&self, stream: TcpStream, peer: SocketAddr) -> Box<dyn ConnectionHandler>;
}

/// Client-facing accept loop. Holds no session state.
pub struct ConnectionListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl ConnectionListener {
    pub async fn bind(addr: SocketAddr) -> Result<Self, GatewayError> {
        let bind_err = |source| GatewayError::ListenerBind { addr, source };
        let listener = TcpListener::bind(addr).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until `shutdown` fires, then close the socket and
    /// wait for running handlers to return.
    pub async fn serve(self, factory: Arc<dyn ConnectionHandlerFactory>, shutdown: CancellationToken) {
        let tracker = TaskTracker::new();

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "client connected");
                    let handler = factory.create_handler(stream, peer);
                    tracker.spawn(handler.run(shutdown.clone()));
                },
                Err(e) => {
                    warn!(error = %e, "client accept failed");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(ACCEPT_BACKOFF) => {},
                    }
                },
            }
        }

        let Self {
            listener,
            local_addr,
        } = self;
        drop(listener);
        info!(addr = %local_addr, "client listener closed, draining connections");
        tracker.close();
        tracker.wait().await;
    }
}
