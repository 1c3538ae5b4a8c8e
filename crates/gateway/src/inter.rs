//! Inter-server endpoint: shard processes connect here and call the
//! `CharServer` methods over line-delimited JSON frames.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    futures::StreamExt,
    tokio::{
        io::AsyncWriteExt,
        net::{TcpListener, TcpStream},
    },
    tokio_util::{
        codec::{FramedRead, LinesCodec, LinesCodecError},
        sync::CancellationToken,
        task::TaskTracker,
    },
    tracing::{debug, info, warn},
};

use rhea_protocol::{ErrorShape, MAX_FRAME_BYTES, RequestFrame, ResponseFrame, error_codes};

use crate::{
    error::GatewayError,
    methods::{MethodContext, MethodRegistry},
    registry::ShardRegistry,
    session::ShardSession,
};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Split `net.tcp://host:port/` into a host and port.
pub fn parse_inter_uri(uri: &str) -> Result<(String, u16), GatewayError> {
    let invalid = |reason: &str| GatewayError::InvalidInterUri {
        uri: uri.to_string(),
        reason: reason.to_string(),
    };
    let parsed = url::Url::parse(uri).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "net.tcp" | "tcp") {
        return Err(invalid("scheme must be net.tcp or tcp"));
    }
    let host = parsed.host_str().ok_or_else(|| invalid("missing host"))?;
    let port = parsed.port().ok_or_else(|| invalid("missing port"))?;
    // Bracketed IPv6 hosts come back with their brackets.
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Ok((host.to_string(), port))
}

/// The bound inter-server endpoint.
pub struct InterServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    methods: Arc<MethodRegistry>,
    registry: Arc<ShardRegistry>,
}

impl InterServer {
    pub async fn bind(uri: &str, registry: Arc<ShardRegistry>) -> Result<Self, GatewayError> {
        let (host, port) = parse_inter_uri(uri)?;
        let bind_err = |source| GatewayError::InterBind {
            addr: format!("{host}:{port}"),
            source,
        };
        let listener = TcpListener::bind((host.as_str(), port))
            .await
            .map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;
        Ok(Self {
            listener,
            local_addr,
            methods: Arc::new(MethodRegistry::new()),
            registry,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept shard sessions until `shutdown` fires.
    ///
    /// On shutdown the socket is closed first, then every session finishes
    /// the call it is handling and exits; this returns once all have.
    pub async fn serve(self, shutdown: CancellationToken) {
        let Self {
            listener,
            local_addr,
            methods,
            registry,
        } = self;
        let tracker = TaskTracker::new();
        let next_session = AtomicU64::new(1);

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    let id = next_session.fetch_add(1, Ordering::Relaxed);
                    debug!(session_id = id, %peer, "shard session opened");
                    tracker.spawn(run_session(
                        stream,
                        Arc::new(ShardSession::new(id, peer)),
                        Arc::clone(&methods),
                        Arc::clone(&registry),
                        shutdown.clone(),
                    ));
                },
                Err(e) => {
                    warn!(error = %e, "inter-server accept failed");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(ACCEPT_BACKOFF) => {},
                    }
                },
            }
        }

        drop(listener);
        info!(addr = %local_addr, "inter-server endpoint closed, draining sessions");
        tracker.close();
        tracker.wait().await;
    }
}

async fn run_session(
    stream: TcpStream,
    session: Arc<ShardSession>,
    methods: Arc<MethodRegistry>,
    registry: Arc<ShardRegistry>,
    shutdown: CancellationToken,
) {
    let (read, mut write) = stream.into_split();
    let mut lines = FramedRead::new(read, LinesCodec::new_with_max_length(MAX_FRAME_BYTES));

    loop {
        // Shutdown is only observed between calls; a dispatched call runs
        // to completion.
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next() => line,
        };
        let line = match line {
            Some(Ok(line)) => line,
            None => break,
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                warn!(session_id = session.id, max = MAX_FRAME_BYTES, "shard frame too large, closing");
                break;
            },
            Some(Err(LinesCodecError::Io(e))) => {
                warn!(session_id = session.id, error = %e, "shard session read failed");
                break;
            },
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match RequestFrame::decode(trimmed) {
            Ok(frame) => {
                methods
                    .dispatch(MethodContext {
                        request_id: frame.id,
                        method: frame.method,
                        params: frame.params,
                        session: Arc::clone(&session),
                        registry: Arc::clone(&registry),
                    })
                    .await
            },
            Err(e) => {
                warn!(session_id = session.id, error = %e, "bad frame from shard");
                ResponseFrame::err(0, ErrorShape::new(error_codes::INVALID_REQUEST, e.to_string()))
            },
        };

        let payload = match response.encode() {
            Ok(p) => p,
            Err(e) => {
                warn!(session_id = session.id, error = %e, "failed to encode response");
                break;
            },
        };
        if let Err(e) = write.write_all(payload.as_bytes()).await {
            warn!(session_id = session.id, error = %e, "shard session write failed");
            break;
        }
    }

    // A session that ends without unregistering takes its entry with it.
    let owned = session.registration.lock().await.take();
    if let Some(id) = owned
        && let Some(descriptor) = registry.unregister(id).await
    {
        info!(name = %descriptor.name, session_id = session.id, "shard disconnected");
    }
    debug!(
        session_id = session.id,
        peer = %session.peer,
        secs = session.connected_at.elapsed().as_secs(),
        "shard session closed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_uri() {
        assert_eq!(
            parse_inter_uri("net.tcp://localhost:5401/").unwrap(),
            ("localhost".to_string(), 5401)
        );
    }

    #[test]
    fn parses_ipv6_and_plain_tcp() {
        assert_eq!(
            parse_inter_uri("tcp://[::1]:6000").unwrap(),
            ("::1".to_string(), 6000)
        );
    }

    #[test]
    fn rejects_bad_uris() {
        for uri in ["http://localhost:5401/", "net.tcp://localhost/", "not a uri"] {
            assert!(
                matches!(parse_inter_uri(uri), Err(GatewayError::InvalidInterUri { .. })),
                "{uri}"
            );
        }
    }
}
