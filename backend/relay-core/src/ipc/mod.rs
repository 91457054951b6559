//! IPC layer between renderer processes and the relay.
//!
//! Renderers (the control panel and the audio overlay) are separate processes.
//! They attach over a localhost WebSocket, identify as a [`SurfaceId`], send
//! command events and receive forwarded notifications.
//!
//! # Protocol
//!
//! JSON text frames tagged by `type` (see [`ClientFrame`] / [`ServerFrame`]):
//! - first frame MUST be `hello` with the auth token and the surface id
//! - then any number of `command` frames
//! - the server pushes `event` frames for the surface
//!
//! # Security
//!
//! - Localhost-only binding (`127.0.0.1`)
//! - Non-loopback connections rejected
//! - Authentication token required (generated on server start)
//!
//! [`SurfaceId`]: crate::surface::SurfaceId

pub(crate) mod connection_state;
mod endpoint;
mod frame;
mod handle;
mod server;
mod surface;

pub use endpoint::IpcEndpoint;
pub use frame::{ClientFrame, ServerFrame, decode_client_frame, encode_server_frame};
pub use handle::IpcServerHandle;
pub use server::{IPC_HOST, IpcContext, start_ipc_server};
pub use surface::WsSurface;
