use crate::ipc_tests::helpers::{TEST_AUTH_TOKEN, attach, receive_frame, send_command};

use relay_core::broker::{Broker, MemoryBroker};
use relay_core::ipc::{IpcContext, ServerFrame, start_ipc_server};
use relay_core::relay::Relay;
use relay_core::router::{CommandRouter, ECHO_RECORDING, RouteVariant};
use relay_core::surface::{SurfaceId, SurfaceRegistry};
use relay_core::{QUEUE_FALCON_AUDIO, QUEUE_FALCON_X_WING, QUEUE_FALCON_X_WING_AUDIO};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

async fn wait_until_live(registry: &SurfaceRegistry, surface: SurfaceId) {
    for _ in 0..100 {
        if registry.live_surfaces().await.contains(&surface) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{surface} never attached");
}

/// **VALUE**: Verifies the whole loop: agent reply on the broker reaches the
/// renderer, renderer command reaches the broker.
///
/// **WHY THIS MATTERS**: Each piece is tested alone elsewhere; this proves the
/// relay, the registry and the IPC server agree on surface ids and event names.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Inbound consumers forward to a different registry than IPC registers in
/// - Event names differ between the router and the renderer protocol
/// - Acks are skipped on the end-to-end path
#[tokio::test]
async fn given_running_relay_and_ipc_when_messages_flow_then_both_directions_work() {
    // GIVEN: Relay and IPC server sharing one registry and one broker
    let broker = MemoryBroker::new();
    let registry = SurfaceRegistry::new();
    let relay = Relay::new(
        Arc::new(broker.clone()),
        CommandRouter::new(RouteVariant::AudioOverlay),
        registry.clone(),
        64,
    );
    let relay_handle = relay.start().await;

    let (actions_tx, _actions_rx) = mpsc::unbounded_channel();
    let ipc = start_ipc_server(
        0,
        Some(String::from(TEST_AUTH_TOKEN)),
        IpcContext {
            registry: registry.clone(),
            outbound: relay_handle.outbound().clone(),
            local_actions: actions_tx,
        },
    )
    .await
    .expect("Failed to start IPC server");

    let mut main = attach(ipc.port(), SurfaceId::Main).await;
    let mut overlay = attach(ipc.port(), SurfaceId::AudioOverlay).await;
    wait_until_live(&registry, SurfaceId::Main).await;
    wait_until_live(&registry, SurfaceId::AudioOverlay).await;

    // WHEN: Agents publish replies
    broker
        .publish(QUEUE_FALCON_X_WING, b"Here is your answer")
        .await
        .unwrap();
    broker
        .publish(QUEUE_FALCON_X_WING_AUDIO, b"Transcribing")
        .await
        .unwrap();

    // THEN: Each renderer receives its own message
    assert_eq!(
        receive_frame(&mut main).await,
        ServerFrame::Event {
            name: String::from("new-message"),
            payload: String::from("Here is your answer"),
        }
    );
    assert_eq!(
        receive_frame(&mut overlay).await,
        ServerFrame::Event {
            name: String::from("new-message-audio"),
            payload: String::from("Transcribing"),
        }
    );

    // WHEN: The control panel starts recording
    send_command(&mut main, "start-record", None).await;

    // THEN: The recorder queue gets the keyword and the overlay its echo
    match receive_frame(&mut overlay).await {
        ServerFrame::Event { name, payload } => {
            assert_eq!(name, "new-message-audio");
            assert_eq!(payload, ECHO_RECORDING);
        }
        other => panic!("Expected Event, got {other:?}"),
    }
    assert_eq!(
        broker.published(QUEUE_FALCON_AUDIO).await,
        vec!["START_RECORD"]
    );
    assert_eq!(broker.acked(QUEUE_FALCON_X_WING).await, vec![1]);

    ipc.shutdown();
    relay_handle.shutdown();
}

/// **VALUE**: Verifies the process keeps serving renderers with no broker.
///
/// **WHY THIS MATTERS**: RabbitMQ being down must not take the overlay down;
/// commands fail and are logged, the connection stays open.
#[tokio::test]
async fn given_unreachable_broker_when_renderer_sends_commands_then_connection_survives() {
    let broker = MemoryBroker::unreachable();
    let registry = SurfaceRegistry::new();
    let relay = Relay::new(
        Arc::new(broker.clone()),
        CommandRouter::new(RouteVariant::Standard),
        registry.clone(),
        64,
    );
    let relay_handle = relay.start().await;
    assert!(relay_handle.active_queues().is_empty());

    let (actions_tx, _actions_rx) = mpsc::unbounded_channel();
    let ipc = start_ipc_server(
        0,
        Some(String::from(TEST_AUTH_TOKEN)),
        IpcContext {
            registry: registry.clone(),
            outbound: relay_handle.outbound().clone(),
            local_actions: actions_tx,
        },
    )
    .await
    .expect("Failed to start IPC server");

    let mut main = attach(ipc.port(), SurfaceId::Main).await;
    wait_until_live(&registry, SurfaceId::Main).await;

    send_command(&mut main, "print-screen", None).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Broker comes back; the next command goes through
    broker.set_reachable(true);
    send_command(&mut main, "print-screen", None).await;

    for _ in 0..100 {
        if !broker.published("QUEUE_FALCON_SCREEN").await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(
        broker.published("QUEUE_FALCON_SCREEN").await,
        vec!["PRINT_SCREEN"]
    );
    assert!(registry.live_surfaces().await.contains(&SurfaceId::Main));

    ipc.shutdown();
    relay_handle.shutdown();
}
