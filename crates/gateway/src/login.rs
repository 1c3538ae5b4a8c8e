//! Default client protocol: one JSON `LoginRequest` per line, answered with
//! one `LoginResponse` per line.

use std::{net::SocketAddr, sync::Arc};

use {
    async_trait::async_trait,
    futures::StreamExt,
    tokio::{io::AsyncWriteExt, net::TcpStream},
    tokio_util::{
        codec::{FramedRead, LinesCodec, LinesCodecError},
        sync::CancellationToken,
    },
    tracing::{debug, error, info, warn},
};

use {
    rhea_accounts::Authenticator,
    rhea_protocol::{LoginRequest, LoginResponse, MAX_FRAME_BYTES, login_codes},
};

use crate::listener::{ConnectionHandler, ConnectionHandlerFactory};

pub struct LoginConnectionFactory {
    authenticator: Arc<Authenticator>,
}

impl LoginConnectionFactory {
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        Self { authenticator }
    }
}

impl ConnectionHandlerFactory for LoginConnectionFactory {
    fn create_handler(&self, stream: TcpStream, peer: SocketAddr) -> Box<dyn ConnectionHandler> {
        Box::new(LoginConnection {
            stream,
            peer,
            authenticator: Arc::clone(&self.authenticator),
        })
    }
}

struct LoginConnection {
    stream: TcpStream,
    peer: SocketAddr,
    authenticator: Arc<Authenticator>,
}

/// A store failure is reported to the client as `SERVER_REJECTED`.
async fn answer(authenticator: &Authenticator, peer: SocketAddr, req: &LoginRequest) -> LoginResponse {
    match authenticator.authenticate(req).await {
        Ok(outcome) => {
            if outcome.is_granted() {
                info!(%peer, username = %req.username, "login granted");
            } else {
                debug!(%peer, username = %req.username, ?outcome, "login refused");
            }
            outcome.into_response()
        },
        Err(e) => {
            error!(%peer, username = %req.username, error = %e, "account store error during login");
            LoginResponse::refused(login_codes::SERVER_REJECTED)
        },
    }
}

#[async_trait]
impl ConnectionHandler for LoginConnection {
    async fn run(self: Box<Self>, shutdown: CancellationToken) {
        let LoginConnection {
            mut stream,
            peer,
            authenticator,
        } = *self;
        let (read, mut write) = stream.split();
        let mut lines = FramedRead::new(read, LinesCodec::new_with_max_length(MAX_FRAME_BYTES));

        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => break,
                line = lines.next() => line,
            };
            let line = match line {
                Some(Ok(line)) => line,
                None => break,
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    warn!(%peer, max = MAX_FRAME_BYTES, "login frame too large, closing");
                    break;
                },
                Some(Err(LinesCodecError::Io(e))) => {
                    debug!(%peer, error = %e, "client read failed");
                    break;
                },
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let req = match LoginRequest::decode(trimmed) {
                Ok(req) => req,
                Err(e) => {
                    warn!(%peer, error = %e, "bad login frame, closing");
                    break;
                },
            };

            let response = answer(&authenticator, peer, &req).await;
            let payload = match response.encode() {
                Ok(p) => p,
                Err(e) => {
                    warn!(%peer, error = %e, "failed to encode login response");
                    break;
                },
            };
            if let Err(e) = write.write_all(payload.as_bytes()).await {
                debug!(%peer, error = %e, "client write failed");
                break;
            }
        }
        debug!(%peer, "client disconnected");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use {
        super::*,
        crate::listener::ConnectionListener,
        rhea_accounts::{
            Account, AccountError, AccountId, AccountRepository, AuthPolicy,
            MemoryAccountRepository,
        },
        rhea_protocol::Sex,
        tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    };

    struct Unreachable;

    #[async_trait]
    impl AccountRepository for Unreachable {
        fn backend(&self) -> &'static str {
            "unreachable"
        }

        async fn find_by_username(&self, _username: &str) -> Result<Option<Account>, AccountError> {
            Err(AccountError::Store(sqlx::Error::PoolTimedOut))
        }

        async fn clear_ban(&self, _account_id: AccountId) -> Result<(), AccountError> {
            Err(AccountError::Store(sqlx::Error::PoolTimedOut))
        }
    }

    async fn spawn(repo: Arc<dyn AccountRepository>) -> (SocketAddr, CancellationToken) {
        let authenticator = Arc::new(Authenticator::new(repo, AuthPolicy::default()));
        let listener = ConnectionListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr();
        let shutdown = CancellationToken::new();
        tokio::spawn(listener.serve(
            Arc::new(LoginConnectionFactory::new(authenticator)),
            shutdown.clone(),
        ));
        (addr, shutdown)
    }

    async fn exchange(conn: &mut TcpStream, line: &str) -> Option<LoginResponse> {
        let (read, mut write) = conn.split();
        write.write_all(line.as_bytes()).await.unwrap();
        let mut reader = BufReader::new(read);
        let mut reply = String::new();
        match reader.read_line(&mut reply).await.unwrap() {
            0 => None,
            _ => Some(LoginResponse::decode(reply.trim()).unwrap()),
        }
    }

    #[tokio::test]
    async fn answers_several_requests_on_one_connection() {
        let repo = Arc::new(MemoryAccountRepository::with_accounts([Account::new(
            7, "alice", "pw", Sex::Male,
        )]));
        let (addr, shutdown) = spawn(repo).await;
        let mut conn = TcpStream::connect(addr).await.unwrap();

        let bad = exchange(&mut conn, "{\"username\":\"alice\",\"password\":\"nope\"}\n")
            .await
            .unwrap();
        assert_eq!(bad, LoginResponse::refused(login_codes::BAD_PASSWORD));

        let good = exchange(&mut conn, "{\"username\":\"alice\",\"password\":\"pw\"}\n")
            .await
            .unwrap();
        assert_eq!(good, LoginResponse::granted(7, Sex::Male));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn store_failure_is_server_rejected() {
        let (addr, shutdown) = spawn(Arc::new(Unreachable)).await;
        let mut conn = TcpStream::connect(addr).await.unwrap();
        let resp = exchange(&mut conn, "{\"username\":\"alice\",\"password\":\"pw\"}\n")
            .await
            .unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error_code, login_codes::SERVER_REJECTED);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn frame_over_the_limit_closes_connection() {
        let (addr, shutdown) = spawn(Arc::new(MemoryAccountRepository::new())).await;
        let mut conn = TcpStream::connect(addr).await.unwrap();

        // No newline ever arrives; the server must give up at the limit
        // rather than keep buffering.
        let chunk = vec![b'a'; 16 * 1024];
        let mut sent = 0;
        while sent < 4 * MAX_FRAME_BYTES {
            if conn.write_all(&chunk).await.is_err() {
                break;
            }
            sent += chunk.len();
        }

        let mut buf = [0u8; 64];
        let read = tokio::time::timeout(Duration::from_secs(5), conn.read(&mut buf))
            .await
            .expect("connection left open past the frame limit");
        // A clean close or a reset both mean the server dropped the socket.
        assert!(matches!(read, Ok(0) | Err(_)), "unexpected reply: {read:?}");
        shutdown.cancel();
    }

    #[tokio::test]
    async fn malformed_frame_closes_connection() {
        let (addr, shutdown) = spawn(Arc::new(MemoryAccountRepository::new())).await;
        let mut conn = TcpStream::connect(addr).await.unwrap();
        assert!(exchange(&mut conn, "not json\n").await.is_none());
        shutdown.cancel();
    }
}
