//! IPC server handle type.

use std::net::SocketAddr;

use log::info;
use tokio::task::JoinHandle;

/// Handle to a running IPC WebSocket server.
///
/// Returned by [`start_ipc_server`](crate::ipc::start_ipc_server). Dropping the
/// handle does **not** stop the server; call [`IpcServerHandle::shutdown`].
pub struct IpcServerHandle {
    pub(crate) local_addr: SocketAddr,
    pub(crate) auth_token: String,
    pub(crate) accept_task: JoinHandle<()>,
}

impl IpcServerHandle {
    /// Address actually bound (resolves port 0 to the assigned port).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// Stop accepting new renderers. Open connections run until they close.
    pub fn shutdown(self) {
        self.accept_task.abort();
        info!("IPC server on {} stopped accepting", self.local_addr);
    }
}
