use x_wing::app::{ExitReason, RunningApp};

use relay_core::QUEUE_FALCON_X_WING;
use relay_core::config::{BrokerBackend, RelayConfig};
use relay_core::ipc::{ClientFrame, IpcEndpoint, ServerFrame};
use relay_core::surface::SurfaceId;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tempfile::TempDir;
use tokio_tungstenite::{connect_async, tungstenite::Message};

// ============================================================================
// Integration tests for the application shell
// These start the whole process wiring against the in-process broker
// ============================================================================

fn memory_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.broker.backend = BrokerBackend::Memory;
    config.ipc.port = 0;
    config.ipc.auth_token = Some(String::from("shell-test-token"));
    config
}

/// **VALUE**: Verifies startup publishes a usable endpoint and starts consumers.
///
/// **WHY THIS MATTERS**: Renderers find the relay only through `ipc.json`; a
/// stale port or token there leaves every window blank.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - `ipc.json` records the configured port 0 instead of the bound port
/// - Consumers are not started for the memory backend
#[tokio::test]
async fn given_memory_backend_when_started_then_endpoint_written_and_consumers_running() {
    // GIVEN: A config directory and an in-process broker
    let dir = TempDir::new().unwrap();

    // WHEN: Starting the shell
    let app = RunningApp::start(&memory_config(), dir.path())
        .await
        .expect("App should start");

    // THEN: ipc.json matches the live server
    let endpoint = IpcEndpoint::read(dir.path()).unwrap();
    assert_eq!(&endpoint, app.endpoint());
    assert_ne!(endpoint.port, 0);
    assert_eq!(endpoint.auth_token, "shell-test-token");
    assert!(app.active_queues().contains(&QUEUE_FALCON_X_WING));

    app.shutdown().await;
}

/// **VALUE**: Verifies close-app from a renderer ends the wait loop.
///
/// **WHY THIS MATTERS**: The close button is the only way a user quits the
/// overlay; it must reach the shell and not the broker.
#[tokio::test]
async fn given_running_app_when_renderer_sends_close_app_then_exit_reason_close_app() {
    let dir = TempDir::new().unwrap();
    let mut app = RunningApp::start(&memory_config(), dir.path())
        .await
        .expect("App should start");

    // GIVEN: A renderer attached via the published endpoint
    let endpoint = IpcEndpoint::read(dir.path()).unwrap();
    let (mut ws, _) = connect_async(endpoint.url())
        .await
        .expect("Failed to connect to WebSocket server");

    let hello = ClientFrame::Hello {
        token: endpoint.auth_token.clone(),
        surface: SurfaceId::Main,
    };
    ws.send(Message::text(serde_json::to_string(&hello).unwrap()))
        .await
        .unwrap();
    let ack = ws.next().await.unwrap().unwrap().into_text().unwrap();
    let ack: ServerFrame = serde_json::from_str(ack.as_str()).unwrap();
    assert!(matches!(ack, ServerFrame::HelloAck { accepted: true, .. }));

    // WHEN: The renderer asks to close
    let close = ClientFrame::Command {
        name: String::from("close-app"),
        payload: None,
    };
    ws.send(Message::text(serde_json::to_string(&close).unwrap()))
        .await
        .unwrap();

    // THEN: The shell is told to exit
    let reason = tokio::time::timeout(Duration::from_secs(2), app.wait_for_exit())
        .await
        .expect("Timed out waiting for exit");
    assert_eq!(reason, ExitReason::CloseApp);

    app.shutdown().await;
}

/// **VALUE**: Verifies a taken IPC port is reported as a startup error.
#[tokio::test]
async fn given_port_in_use_when_started_then_ipc_error() {
    let dir = TempDir::new().unwrap();
    let first = RunningApp::start(&memory_config(), dir.path())
        .await
        .expect("App should start");

    let mut config = memory_config();
    config.ipc.port = first.endpoint().port;
    let second = RunningApp::start(&config, dir.path()).await;

    assert!(matches!(second, Err(x_wing::error::XwingError::Ipc { .. })));

    first.shutdown().await;
}
