pub mod broker;
pub mod config;
pub mod ipc;
pub mod relay;
pub mod router;
pub mod surface;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Broker(#[from] broker::BrokerError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Ipc(#[from] ipc::IpcError),

    #[error(transparent)]
    Relay(#[from] relay::RelayError),

    #[error(transparent)]
    Router(#[from] router::RouterError),

    #[error(transparent)]
    Surface(#[from] surface::SurfaceError),
}
