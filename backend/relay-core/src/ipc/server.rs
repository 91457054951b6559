//! IPC WebSocket server implementation.
//!
//! The server:
//!
//! - Listens on localhost only (security)
//! - Uses JSON text frames tagged by `type`
//! - Requires an authentication handshake that also names the surface
//! - Handles each renderer connection in its own task
//!
//! Each authenticated connection is registered in the [`SurfaceRegistry`]
//! for its surface id. Frames for the renderer are queued to a dedicated
//! writer task so relays never wait on a socket.

use crate::error::ipc::IpcError;
use crate::ipc::connection_state::ConnectionState;
use crate::ipc::frame::{ClientFrame, ServerFrame, decode_client_frame, encode_server_frame};
use crate::ipc::handle::IpcServerHandle;
use crate::ipc::surface::WsSurface;
use crate::relay::{DispatchOutcome, OutboundRelay};
use crate::router::LocalAction;
use crate::surface::{SurfaceId, SurfaceRegistry};

use common::ErrorLocation;

use std::net::SocketAddr;
use std::panic::Location;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn as TokioSpawn;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use uuid::Uuid;

pub const IPC_HOST: &str = "127.0.0.1";

type WsWrite = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsRead = SplitStream<WebSocketStream<TcpStream>>;

/// What every connection needs from the rest of the process.
#[derive(Clone)]
pub struct IpcContext {
    pub registry: SurfaceRegistry,
    pub outbound: OutboundRelay,
    /// Receives local actions such as `close-app` for the application shell.
    pub local_actions: mpsc::UnboundedSender<LocalAction>,
}

/// Starts the IPC WebSocket server on the specified port.
///
/// Binds `127.0.0.1:<ipc_port>` (port 0 picks a free port) and spawns a
/// background task accepting renderer connections.
///
/// # Errors
///
/// Returns [`IpcError::Io`] if the port is in use or cannot be bound.
pub async fn start_ipc_server(
    ipc_port: u16,
    auth_token: Option<String>,
    context: IpcContext,
) -> Result<IpcServerHandle, IpcError> {
    let auth_token = auth_token.unwrap_or_else(|| {
        let token = Uuid::new_v4().to_string();
        info!("Generated IPC auth token");
        token
    });

    let address = format!("{IPC_HOST}:{ipc_port}");
    let listener = TcpListener::bind(&address).await?;
    let local_addr = listener.local_addr()?;

    info!("IPC server listening on {}", local_addr);

    let token = auth_token.clone();
    let accept_task = TokioSpawn(async move {
        while let Ok((stream, addr)) = listener.accept().await {
            info!("Renderer connecting from {}", addr);
            let token_clone = token.clone();
            let context_clone = context.clone();
            TokioSpawn(async move {
                if let Err(e) = handle_connection(stream, addr, token_clone, context_clone).await
                {
                    warn!("Connection from {} ended with error: {}", addr, e);
                }
            });
        }
    });

    Ok(IpcServerHandle {
        local_addr,
        auth_token,
        accept_task,
    })
}

/// Handles a single renderer connection.
///
/// 1. Rejects non-loopback peers
/// 2. Performs the WebSocket handshake
/// 3. Requires a valid `hello` as the first frame
/// 4. Registers the connection as its surface
/// 5. Dispatches `command` frames until the renderer disconnects
/// 6. Unregisters the surface (unless a newer connection replaced it)
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    auth_token: String,
    context: IpcContext,
) -> Result<(), IpcError> {
    // SECURITY: Reject non-loopback connections
    if !addr.ip().is_loopback() {
        warn!("Rejected non-loopback connection from {}", addr);
        return Ok(());
    }

    let ws_stream = accept_async(stream).await.map_err(|e| {
        error!("WebSocket handshake failed: {}", e);
        IpcError::Handshake {
            message: format!("WebSocket handshake failed: {}", e),
            location: ErrorLocation::from(Location::caller()),
        }
    })?;

    let (mut write, mut read) = ws_stream.split();
    let mut state = ConnectionState::new(auth_token);

    // SECURITY: First message MUST be hello
    let surface_id = match read.next().await {
        Some(Ok(Message::Text(text))) => match decode_client_frame(text.as_str()) {
            Ok(ClientFrame::Hello { token, surface }) => {
                if state.authenticate(&token, surface) {
                    info!("Renderer {} authenticated as {}", addr, surface);
                    send_frame(
                        &mut write,
                        &ServerFrame::HelloAck {
                            accepted: true,
                            error: None,
                        },
                    )
                    .await?;
                    state.surface().unwrap_or(surface)
                } else {
                    warn!("Renderer {} auth failed: invalid token", addr);
                    return reject(&mut write, "invalid token").await;
                }
            }
            Ok(other) => {
                warn!("Renderer {} sent {:?} before hello", addr, other);
                return reject(&mut write, "first frame must be hello").await;
            }
            Err(e) => {
                warn!("Renderer {} sent an undecodable first frame: {}", addr, e);
                return reject(&mut write, "first frame must be hello").await;
            }
        },
        Some(Ok(_)) => {
            warn!("Renderer {} sent non-text first frame", addr);
            return reject(&mut write, "first frame must be a text hello").await;
        }
        Some(Err(e)) => {
            error!("Error reading first frame from {}: {}", addr, e);
            return Err(IpcError::Read {
                message: format!("Error reading first frame: {}", e),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        None => {
            warn!("Renderer {} disconnected before hello", addr);
            return Ok(());
        }
    };

    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<ServerFrame>();

    TokioSpawn(async move {
        while let Some(frame) = frames_rx.recv().await {
            if let Err(e) = send_frame(&mut write, &frame).await {
                warn!("Dropping renderer writer for {}: {}", addr, e);
                break;
            }
        }
        if let Err(e) = write.close().await {
            debug!("Close for {} failed: {}", addr, e);
        }
    });

    let surface = Arc::new(WsSurface::new(surface_id, frames_tx));
    let instance = context.registry.register(surface_id, surface).await;

    let result = read_commands(&mut read, addr, surface_id, &context).await;

    context.registry.unregister(surface_id, instance).await;
    info!("Renderer {} ({}) disconnected", addr, surface_id);

    result
}

async fn read_commands(
    read: &mut WsRead,
    addr: SocketAddr,
    surface_id: SurfaceId,
    context: &IpcContext,
) -> Result<(), IpcError> {
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => match decode_client_frame(text.as_str()) {
                Ok(ClientFrame::Command { name, payload }) => {
                    handle_command(&name, payload, surface_id, context).await;
                }
                Ok(ClientFrame::Hello { .. }) => {
                    warn!("Renderer {} sent a second hello, ignoring", addr);
                }
                Err(e) => {
                    warn!("Renderer {} sent an invalid frame: {}", addr, e);
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(_) => {
                warn!("Renderer {} sent non-text frame, ignoring", addr);
            }
            Err(e) => {
                error!("Error reading from {}: {}", addr, e);
                return Err(IpcError::Read {
                    message: format!("Error reading frame: {}", e),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }
    }

    Ok(())
}

/// Dispatch one command; every failure ends here as a log entry.
async fn handle_command(
    name: &str,
    payload: Option<String>,
    surface_id: SurfaceId,
    context: &IpcContext,
) {
    info!("Command '{}' from {}", name, surface_id);

    match context.outbound.dispatch_named(name, payload).await {
        Ok(DispatchOutcome::Published { queue }) => {
            debug!("Command '{}' published to '{}'", name, queue);
        }
        Ok(DispatchOutcome::Reply { event, text }) => {
            if let Err(e) = context.registry.forward(surface_id, event, text).await {
                debug!("Reply to {} not delivered: {}", surface_id, e);
            }
        }
        Ok(DispatchOutcome::Local(action)) => {
            if context.local_actions.send(action).is_err() {
                warn!("No listener for local action {:?}", action);
            }
        }
        Err(e) => {
            error!("Command '{}' from {} failed: {}", name, surface_id, e);
        }
    }
}

/// Refuse the handshake and close the connection.
#[track_caller]
fn auth_error(reason: &str) -> IpcError {
    IpcError::Auth {
        message: reason.to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}

async fn reject(write: &mut WsWrite, reason: &str) -> Result<(), IpcError> {
    send_frame(
        write,
        &ServerFrame::HelloAck {
            accepted: false,
            error: Some(reason.to_string()),
        },
    )
    .await?;

    if let Err(e) = write.close().await {
        debug!("Close after rejected hello failed: {}", e);
    }

    Err(auth_error(reason))
}

async fn send_frame(write: &mut WsWrite, frame: &ServerFrame) -> Result<(), IpcError> {
    let text = encode_server_frame(frame)?;

    write
        .send(Message::text(text))
        .await
        .map_err(|e| IpcError::Send {
            message: format!("Failed to send frame: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
}
