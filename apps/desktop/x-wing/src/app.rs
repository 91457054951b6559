//! Application shell: config, broker client, relay and renderer IPC wired together.
//!
//! Startup order:
//!
//! 1. Config is loaded (defaults on failure), env overrides applied, validated
//! 2. The broker client is chosen from `broker.backend`
//! 3. The relay declares every queue and starts its consumers
//! 4. The IPC server starts and `ipc.json` is written for renderers
//!
//! A broker that cannot be reached does not fail startup; the relay stays
//! idle and renderers can still attach.

use crate::error::XwingError;

use relay_core::APP_NAME;
use relay_core::broker::{AmqpBroker, Broker, MemoryBroker};
use relay_core::config::{BrokerBackend, RelayConfig};
use relay_core::ipc::{IpcContext, IpcEndpoint, IpcServerHandle, start_ipc_server};
use relay_core::relay::{Relay, RelayHandle};
use relay_core::router::{CommandRouter, LocalAction};
use relay_core::surface::SurfaceRegistry;

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};
use tokio::signal;
use tokio::sync::mpsc;

const LOG_DIR_NAME: &str = "logs";

/// Where the overlay keeps its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Holds `config.json` and `ipc.json`.
    pub config_dir: PathBuf,
    /// Holds `x-wing.log`.
    pub log_dir: PathBuf,
}

impl AppPaths {
    pub fn new(config_dir: PathBuf, log_dir: PathBuf) -> Self {
        Self {
            config_dir,
            log_dir,
        }
    }

    /// Platform directories: config under the user config dir, logs under
    /// the local data dir (or next to the config when there is none).
    ///
    /// # Errors
    ///
    /// Returns [`XwingError::Config`] if the platform has no config directory.
    pub fn resolve() -> Result<Self, XwingError> {
        let config_dir = RelayConfig::default_dir().map_err(|e| XwingError::Config {
            message: format!("Failed to resolve config directory: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let log_dir = dirs::data_local_dir()
            .map(|dir| dir.join(APP_NAME).join(LOG_DIR_NAME))
            .unwrap_or_else(|| config_dir.join(LOG_DIR_NAME));

        Ok(Self::new(config_dir, log_dir))
    }
}

/// Load, override and validate the config.
///
/// An unreadable or invalid file falls back to defaults with a warning;
/// environment overrides are applied on top and the result must validate.
///
/// # Errors
///
/// Returns [`XwingError::Config`] if the final config is invalid (for example
/// a malformed `RABBITMQ_URI`).
pub fn load_config(config_dir: &Path) -> Result<RelayConfig, XwingError> {
    let mut config = match RelayConfig::load(config_dir) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config, using defaults: {e}");
            RelayConfig::default()
        }
    };

    config.apply_env_overrides();

    config.validate().map_err(|e| XwingError::Config {
        message: e.to_string(),
        location: ErrorLocation::from(Location::caller()),
    })?;

    info!("Using config: {config:?}");
    Ok(config)
}

/// The concrete broker client, kept so it can be closed on shutdown.
enum BrokerClient {
    Amqp(Arc<AmqpBroker>),
    Memory(MemoryBroker),
}

impl BrokerClient {
    fn from_config(config: &RelayConfig) -> Self {
        match config.broker.backend {
            BrokerBackend::Amqp => {
                let broker = AmqpBroker::new(config.broker_uri(), config.broker.connection_mode);
                info!(
                    "Using RabbitMQ at {} ({:?} publishing)",
                    broker.uri(),
                    broker.mode()
                );
                BrokerClient::Amqp(Arc::new(broker))
            }
            BrokerBackend::Memory => {
                warn!("Using in-process broker; no messages leave this process");
                BrokerClient::Memory(MemoryBroker::new())
            }
        }
    }

    fn shared(&self) -> Arc<dyn Broker> {
        match self {
            BrokerClient::Amqp(broker) => Arc::clone(broker) as Arc<dyn Broker>,
            BrokerClient::Memory(broker) => Arc::new(broker.clone()),
        }
    }

    async fn close(&self) {
        if let BrokerClient::Amqp(broker) = self {
            broker.close().await;
        }
    }
}

/// Why the overlay is exiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// A renderer sent `close-app`.
    CloseApp,
    /// Ctrl-C / SIGINT.
    Interrupted,
    /// Every local action sender is gone; nothing can ask us to quit anymore.
    ActionsClosed,
}

/// A started overlay process.
pub struct RunningApp {
    broker: BrokerClient,
    relay: RelayHandle,
    ipc: IpcServerHandle,
    endpoint: IpcEndpoint,
    local_actions: mpsc::UnboundedReceiver<LocalAction>,
}

impl RunningApp {
    /// Start the relay and the IPC server and publish `ipc.json`.
    ///
    /// # Errors
    ///
    /// - [`XwingError::Ipc`] if the IPC port cannot be bound
    /// - [`XwingError::Config`] if `ipc.json` cannot be written
    pub async fn start(config: &RelayConfig, config_dir: &Path) -> Result<Self, XwingError> {
        let broker = BrokerClient::from_config(config);
        let registry = SurfaceRegistry::new();
        let router = CommandRouter::new(config.relay.variant);

        info!("Starting relay ({:?} routes)", router.variant());
        let relay = Relay::new(
            broker.shared(),
            router,
            registry.clone(),
            config.relay.dedup_window,
        )
        .start()
        .await;

        let (actions_tx, local_actions) = mpsc::unbounded_channel();
        let context = IpcContext {
            registry,
            outbound: relay.outbound().clone(),
            local_actions: actions_tx,
        };

        info!("Starting IPC server on port {}", config.ipc.port);
        let ipc = match start_ipc_server(config.ipc.port, config.ipc.auth_token.clone(), context)
            .await
        {
            Ok(ipc) => ipc,
            Err(e) => {
                relay.shutdown();
                broker.close().await;
                return Err(XwingError::Ipc {
                    message: format!("Failed to start IPC server: {e}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        let endpoint = IpcEndpoint::new(ipc.port(), ipc.auth_token().to_string());
        if let Err(e) = endpoint.write(config_dir) {
            ipc.shutdown();
            relay.shutdown();
            broker.close().await;
            return Err(XwingError::Config {
                message: format!("Failed to publish IPC endpoint: {e}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        info!("Renderers can attach at {}", endpoint.url());

        Ok(Self {
            broker,
            relay,
            ipc,
            endpoint,
            local_actions,
        })
    }

    pub fn endpoint(&self) -> &IpcEndpoint {
        &self.endpoint
    }

    /// Inbound queues currently being consumed.
    pub fn active_queues(&self) -> Vec<&'static str> {
        self.relay.active_queues()
    }

    /// Wait for `close-app` from a renderer or Ctrl-C.
    pub async fn wait_for_exit(&mut self) -> ExitReason {
        tokio::select! {
            action = self.local_actions.recv() => Self::exit_reason(action),
            interrupted = signal::ctrl_c() => match interrupted {
                Ok(()) => ExitReason::Interrupted,
                Err(e) => {
                    error!("Cannot listen for Ctrl-C, waiting for close-app only: {e}");
                    Self::exit_reason(self.local_actions.recv().await)
                }
            },
        }
    }

    fn exit_reason(action: Option<LocalAction>) -> ExitReason {
        match action {
            Some(LocalAction::Quit) => ExitReason::CloseApp,
            None => ExitReason::ActionsClosed,
        }
    }

    /// Stop accepting renderers, stop consumers and close broker connections.
    pub async fn shutdown(self) {
        self.ipc.shutdown();
        self.relay.shutdown();
        self.broker.close().await;
        info!("{APP_NAME} stopped");
    }
}
