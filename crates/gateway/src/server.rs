use std::{net::SocketAddr, path::Path, sync::Arc};

use {
    async_trait::async_trait,
    tokio::{sync::watch, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{error, info, warn},
};

use {
    rhea_accounts::{AccountError, AccountRepository, AuthPolicy, Authenticator},
    rhea_config::{DatabaseConfig, RheaConfig},
};

use crate::{
    error::GatewayError,
    inter::InterServer,
    listener::{ConnectionHandlerFactory, ConnectionListener},
    login::LoginConnectionFactory,
    registry::ShardRegistry,
    state::GatewayState,
    status::serve_status,
};

// ── Lifecycle ────────────────────────────────────────────────────────────────

/// Where the gateway is in its lifecycle. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayPhase {
    Uninitialized,
    ConfigLoaded,
    StoreConnected,
    RegistrationGatewayRunning,
    Serving,
    Stopped,
}

/// Opens the account store at startup.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(
        &self,
        config: &DatabaseConfig,
    ) -> Result<Arc<dyn AccountRepository>, AccountError>;
}

/// Connects to the driver named in `database.driver`.
pub struct ConfiguredStore;

#[async_trait]
impl StoreConnector for ConfiguredStore {
    async fn connect(
        &self,
        config: &DatabaseConfig,
    ) -> Result<Arc<dyn AccountRepository>, AccountError> {
        rhea_accounts::connect(config).await
    }
}

/// An already-open repository, used as is.
#[async_trait]
impl StoreConnector for Arc<dyn AccountRepository> {
    async fn connect(
        &self,
        _config: &DatabaseConfig,
    ) -> Result<Arc<dyn AccountRepository>, AccountError> {
        Ok(Arc::clone(self))
    }
}

// ── Gateway ──────────────────────────────────────────────────────────────────

/// A configured gateway that has not started any component yet.
pub struct Gateway {
    config: RheaConfig,
    phase: watch::Sender<GatewayPhase>,
    shutdown: CancellationToken,
    factory: Option<Arc<dyn ConnectionHandlerFactory>>,
}

impl Gateway {
    /// Load configuration from `path`, or discover it. Never fails; missing
    /// or unreadable files fall back to defaults.
    pub fn load(path: Option<&Path>) -> Self {
        Self::new(rhea_config::discover_and_load(path))
    }

    pub fn new(config: RheaConfig) -> Self {
        let (phase, _) = watch::channel(GatewayPhase::Uninitialized);
        phase.send_replace(GatewayPhase::ConfigLoaded);
        Self {
            config,
            phase,
            shutdown: CancellationToken::new(),
            factory: None,
        }
    }

    /// Serve client connections with `factory` instead of the JSON login
    /// handler.
    pub fn with_handler_factory(mut self, factory: Arc<dyn ConnectionHandlerFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn phase(&self) -> watch::Receiver<GatewayPhase> {
        self.phase.subscribe()
    }

    /// Cancelling this token stops the gateway once it is serving.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Bring up every component in order.
    ///
    /// If the store cannot be reached no socket is bound. A later failure
    /// stops whatever was already started before returning.
    pub async fn start(self, store: &dyn StoreConnector) -> Result<RunningGateway, GatewayError> {
        let Self {
            config,
            phase,
            shutdown,
            factory,
        } = self;

        let repo = match store.connect(&config.database).await {
            Ok(repo) => repo,
            Err(e) => {
                error!(
                    driver = %config.database.driver,
                    error = %e,
                    "account store unavailable, gateway not started"
                );
                phase.send_replace(GatewayPhase::Stopped);
                return Err(GatewayError::StoreConnect(e));
            },
        };
        info!(backend = repo.backend(), "account store connected");
        phase.send_replace(GatewayPhase::StoreConnected);

        let registry = Arc::new(ShardRegistry::new());
        let authenticator = Arc::new(Authenticator::new(Arc::clone(&repo), AuthPolicy {
            min_client_version: config.auth.min_client_version,
        }));
        let state = GatewayState::new(Arc::clone(&registry), Arc::clone(&authenticator));

        let mut running = RunningGateway {
            state,
            repo,
            phase,
            shutdown,
            components: Vec::new(),
            inter_addr: None,
            client_addr: None,
            status_addr: None,
        };

        // Registration gateway.
        let inter = match InterServer::bind(&config.inter.uri, registry).await {
            Ok(inter) => inter,
            Err(e) => return Err(running.abort(e).await),
        };
        running.inter_addr = Some(inter.local_addr());
        running.spawn("registration gateway", |token| inter.serve(token));
        running.phase.send_replace(GatewayPhase::RegistrationGatewayRunning);

        // Client listener.
        let iface = &config.network.interface;
        let listener = match ConnectionListener::bind(SocketAddr::new(iface.ip, iface.port)).await {
            Ok(listener) => listener,
            Err(e) => return Err(running.abort(e).await),
        };
        running.client_addr = Some(listener.local_addr());
        let factory: Arc<dyn ConnectionHandlerFactory> = match factory {
            Some(factory) => factory,
            None => Arc::new(LoginConnectionFactory::new(authenticator)),
        };
        running.spawn("client listener", |token| listener.serve(factory, token));

        // Status endpoint.
        if config.status.enabled {
            let addr = SocketAddr::new(config.status.bind, config.status.port);
            let status = match tokio::net::TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(source) => {
                    return Err(running.abort(GatewayError::StatusBind { addr, source }).await);
                },
            };
            running.status_addr = status.local_addr().ok();
            let state = Arc::clone(&running.state);
            running.spawn("status endpoint", |token| serve_status(status, state, token));
        }

        running.phase.send_replace(GatewayPhase::Serving);
        running.banner(&config);
        Ok(running)
    }
}

// ── Running gateway ──────────────────────────────────────────────────────────

struct Component {
    name: &'static str,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Component {
    async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!(component = self.name, error = %e, "component task failed");
        }
        info!(component = self.name, "stopped");
    }
}

/// Handle to a started gateway.
pub struct RunningGateway {
    state: Arc<GatewayState>,
    repo: Arc<dyn AccountRepository>,
    phase: watch::Sender<GatewayPhase>,
    shutdown: CancellationToken,
    /// In start order; stopped in the same order.
    components: Vec<Component>,
    inter_addr: Option<SocketAddr>,
    client_addr: Option<SocketAddr>,
    status_addr: Option<SocketAddr>,
}

impl RunningGateway {
    fn spawn<F, Fut>(&mut self, name: &'static str, run: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let task = tokio::spawn(run(token.clone()));
        self.components.push(Component { name, token, task });
    }

    async fn abort(self, err: GatewayError) -> GatewayError {
        error!(error = %err, "gateway startup failed");
        self.stop_components().await;
        err
    }

    async fn stop_components(self) {
        for component in self.components {
            component.stop().await;
        }
        self.repo.close().await;
        self.phase.send_replace(GatewayPhase::Stopped);
        info!("gateway stopped");
    }

    fn banner(&self, config: &RheaConfig) {
        let mut lines = vec![
            format!("rhea gateway v{}", self.state.version),
            format!(
                "protocol v{}, registration on {}",
                rhea_protocol::PROTOCOL_VERSION,
                config.inter.uri
            ),
        ];
        if let Some(addr) = self.client_addr {
            lines.push(format!("clients on {addr}"));
        }
        if let Some(addr) = self.status_addr {
            lines.push(format!("status on http://{addr}"));
        }
        lines.push(format!("store: {}", self.repo.backend()));
        let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
        info!("┌{}┐", "─".repeat(width));
        for line in &lines {
            info!("│  {:<w$}│", line, w = width - 2);
        }
        info!("└{}┘", "─".repeat(width));
    }

    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    pub fn inter_addr(&self) -> Option<SocketAddr> {
        self.inter_addr
    }

    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client_addr
    }

    pub fn status_addr(&self) -> Option<SocketAddr> {
        self.status_addr
    }

    pub fn phase(&self) -> watch::Receiver<GatewayPhase> {
        self.phase.subscribe()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Request shutdown. Safe to call more than once.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Serve until shutdown is requested, then stop the registration
    /// gateway, the client listener and the status endpoint in that order,
    /// waiting for each to drain.
    pub async fn wait(self) {
        self.shutdown.cancelled().await;
        info!("shutting down");
        self.stop_components().await;
    }
}

/// Run a gateway from a config file until Ctrl-C.
pub async fn start_gateway(config_path: Option<&Path>) -> anyhow::Result<()> {
    let running = Gateway::load(config_path).start(&ConfiguredStore).await?;

    let token = running.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                token.cancel();
            },
            Err(e) => warn!(error = %e, "failed to listen for ctrl-c"),
        }
    });

    running.wait().await;
    Ok(())
}
