//! Test helpers for IPC integration tests.
//!
//! This module provides utilities for testing the IPC WebSocket server:
//! - Starting a server wired to an in-process broker
//! - Connecting to the server
//! - Sending/receiving JSON frames
//! - Authentication helpers
//! - Connection state checks

use relay_core::broker::MemoryBroker;
use relay_core::ipc::{
    ClientFrame, IpcContext, IpcServerHandle, ServerFrame, start_ipc_server,
};
use relay_core::relay::OutboundRelay;
use relay_core::router::{CommandRouter, LocalAction, RouteVariant};
use relay_core::surface::{SurfaceId, SurfaceRegistry};

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

/// Test constants for authentication
pub const TEST_AUTH_TOKEN: &str = "test-token-12345";

pub type TestSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A running IPC server plus everything a test needs to observe it.
pub struct TestServer {
    pub handle: IpcServerHandle,
    pub broker: MemoryBroker,
    pub registry: SurfaceRegistry,
    pub local_actions: mpsc::UnboundedReceiver<LocalAction>,
}

/// Test helper: Start an IPC server on a free port backed by a memory broker.
pub async fn start_test_server(variant: RouteVariant) -> TestServer {
    let broker = MemoryBroker::new();
    let registry = SurfaceRegistry::new();
    let (actions_tx, actions_rx) = mpsc::unbounded_channel();

    let outbound = OutboundRelay::new(
        Arc::new(broker.clone()),
        CommandRouter::new(variant),
        registry.clone(),
    );
    let context = IpcContext {
        registry: registry.clone(),
        outbound,
        local_actions: actions_tx,
    };

    let handle = start_ipc_server(0, Some(String::from(TEST_AUTH_TOKEN)), context)
        .await
        .expect("Failed to start IPC server");

    TestServer {
        handle,
        broker,
        registry,
        local_actions: actions_rx,
    }
}

/// Test helper: Connect to IPC server and return WebSocket stream.
pub async fn connect_to_server(ipc_port: u16) -> TestSocket {
    let url = format!("ws://127.0.0.1:{}", ipc_port);
    let (ws_stream, _) = connect_async(&url)
        .await
        .expect("Failed to connect to WebSocket server");
    ws_stream
}

/// Test helper: Send a JSON frame over WebSocket.
pub async fn send_frame(ws: &mut TestSocket, frame: &ClientFrame) {
    let text = serde_json::to_string(frame).expect("Failed to encode frame");
    ws.send(Message::text(text))
        .await
        .expect("Failed to send message");
}

/// Test helper: Receive and decode a JSON frame.
pub async fn receive_frame(ws: &mut TestSocket) -> ServerFrame {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("Timed out waiting for frame")
        .expect("No message received")
        .expect("Error receiving message");

    let text = msg.into_text().expect("Expected a text frame");
    serde_json::from_str(text.as_str()).expect("Failed to decode frame")
}

/// Test helper: Send hello and return the server's answer.
pub async fn authenticate(ws: &mut TestSocket, token: &str, surface: SurfaceId) -> ServerFrame {
    send_frame(
        ws,
        &ClientFrame::Hello {
            token: token.to_string(),
            surface,
        },
    )
    .await;

    receive_frame(ws).await
}

/// Test helper: Connect and authenticate as `surface`, asserting acceptance.
pub async fn attach(ipc_port: u16, surface: SurfaceId) -> TestSocket {
    let mut ws = connect_to_server(ipc_port).await;
    let ack = authenticate(&mut ws, TEST_AUTH_TOKEN, surface).await;
    assert_eq!(
        ack,
        ServerFrame::HelloAck {
            accepted: true,
            error: None
        },
        "Auth should succeed"
    );
    ws
}

/// Test helper: Send a command frame.
pub async fn send_command(ws: &mut TestSocket, name: &str, payload: Option<&str>) {
    send_frame(
        ws,
        &ClientFrame::Command {
            name: name.to_string(),
            payload: payload.map(str::to_string),
        },
    )
    .await;
}

/// Test helper: Poll until `surface` is (or is no longer) live in the registry.
pub async fn wait_for_surface(registry: &SurfaceRegistry, surface: SurfaceId, live: bool) {
    for _ in 0..100 {
        if registry.live_surfaces().await.contains(&surface) == live {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Surface {surface} never became live={live}");
}

/// Test helper: Poll until `queue` has `count` published payloads.
pub async fn wait_for_published(broker: &MemoryBroker, queue: &str, count: usize) -> Vec<String> {
    for _ in 0..100 {
        let published = broker.published(queue).await;
        if published.len() >= count {
            return published;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    broker.published(queue).await
}

/// Test helper: Check if WebSocket connection is closed.
pub async fn is_connection_closed(ws: &mut TestSocket) -> bool {
    match tokio::time::timeout(Duration::from_millis(500), ws.next()).await {
        Err(_) => false,
        Ok(None) => true,
        Ok(Some(Ok(Message::Close(_)))) => true,
        Ok(Some(Ok(_))) => false,
        Ok(Some(Err(_))) => true,
    }
}
