use crate::ipc_tests::helpers::{
    TEST_AUTH_TOKEN, attach, authenticate, connect_to_server, is_connection_closed,
    receive_frame, send_command, send_frame, start_test_server, wait_for_published,
    wait_for_surface,
};

use relay_core::ipc::{ClientFrame, ServerFrame};
use relay_core::router::{ECHO_RECORDING, EVENT_REPLY, LocalAction, REPLY_TEXT, RouteVariant};
use relay_core::surface::SurfaceId;
use relay_core::{QUEUE_FALCON_ASK, QUEUE_FALCON_AUDIO, QUEUE_FALCON_SCREEN};

use std::time::Duration;

// ============================================================================
// Authentication Tests
// ============================================================================

/// **VALUE**: Verifies that a valid token is accepted and the surface registered.
///
/// **WHY THIS MATTERS**: Nothing reaches a window until it has authenticated
/// and claimed its surface id.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The hello ack is never sent
/// - The surface is not registered after auth
#[tokio::test]
async fn given_valid_token_when_hello_then_accepted_and_registered() {
    // GIVEN: IPC server running
    let server = start_test_server(RouteVariant::AudioOverlay).await;

    // WHEN: Renderer connects and authenticates as main
    let _ws = attach(server.handle.port(), SurfaceId::Main).await;

    // THEN: Main surface is live
    wait_for_surface(&server.registry, SurfaceId::Main, true).await;
}

/// **VALUE**: Verifies that an invalid token is rejected and the connection closed.
///
/// **WHY THIS MATTERS**: Any local process can reach the port. Without the
/// token check it could publish to the broker as the user.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Auth validation is skipped
/// - The server leaves the connection open after failed auth
/// - The surface is registered before the token is checked
#[tokio::test]
async fn given_invalid_token_when_hello_then_rejected_and_closed() {
    let server = start_test_server(RouteVariant::AudioOverlay).await;
    let mut ws = connect_to_server(server.handle.port()).await;

    let ack = authenticate(&mut ws, "wrong-token", SurfaceId::Main).await;

    match ack {
        ServerFrame::HelloAck { accepted, error } => {
            assert!(!accepted, "Auth should fail");
            assert!(error.is_some(), "Rejection should carry a reason");
        }
        other => panic!("Expected HelloAck, got {other:?}"),
    }
    assert!(
        is_connection_closed(&mut ws).await,
        "Connection should close after failed auth"
    );
    assert!(server.registry.live_surfaces().await.is_empty());
}

/// **VALUE**: Verifies that a command before hello is refused.
///
/// **BUG THIS CATCHES**: Would catch a server that dispatches commands from
/// unauthenticated connections.
#[tokio::test]
async fn given_command_before_hello_when_sent_then_rejected_and_nothing_published() {
    let server = start_test_server(RouteVariant::AudioOverlay).await;
    let mut ws = connect_to_server(server.handle.port()).await;

    send_command(&mut ws, "print-screen", None).await;
    let ack = receive_frame(&mut ws).await;

    assert!(matches!(ack, ServerFrame::HelloAck { accepted: false, .. }));
    assert!(is_connection_closed(&mut ws).await);
    assert!(server.broker.published(QUEUE_FALCON_SCREEN).await.is_empty());
}

#[tokio::test]
async fn given_server_when_started_then_reports_bound_port_and_token() {
    let server = start_test_server(RouteVariant::Standard).await;

    assert_ne!(server.handle.port(), 0);
    assert_eq!(server.handle.auth_token(), TEST_AUTH_TOKEN);
    assert!(server.handle.local_addr().ip().is_loopback());
}

// ============================================================================
// Command Tests
// ============================================================================

/// **VALUE**: Verifies renderer commands end up on the broker.
///
/// **WHY THIS MATTERS**: This is the full outbound path: button press →
/// IPC frame → router → queue.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Command frames are not dispatched
/// - Payloads are transformed wrongly in transit
/// - Message ordering is lost
#[tokio::test]
async fn given_authenticated_when_send_commands_then_published_in_order() {
    let server = start_test_server(RouteVariant::Standard).await;
    let mut ws = attach(server.handle.port(), SurfaceId::Main).await;

    send_command(&mut ws, "start-record", None).await;
    send_command(&mut ws, "stop-record", None).await;
    send_command(&mut ws, "user-text-input", Some("How do I exit vim?")).await;

    assert_eq!(
        wait_for_published(&server.broker, QUEUE_FALCON_AUDIO, 2).await,
        vec!["START_RECORD", "STOP_RECORD"]
    );
    assert_eq!(
        wait_for_published(&server.broker, QUEUE_FALCON_ASK, 1).await,
        vec!["Help with this problem:\n\nHow do I exit vim?\n"]
    );
}

/// **VALUE**: Verifies close-app is handed to the shell, not the broker.
#[tokio::test]
async fn given_authenticated_when_close_app_then_local_quit_delivered() {
    let mut server = start_test_server(RouteVariant::AudioOverlay).await;
    let mut ws = attach(server.handle.port(), SurfaceId::Main).await;

    send_command(&mut ws, "close-app", None).await;

    let action = tokio::time::timeout(Duration::from_secs(2), server.local_actions.recv())
        .await
        .expect("Timed out waiting for local action");
    assert_eq!(action, Some(LocalAction::Quit));
    assert_eq!(server.broker.operation_count(), 0);
}

/// **VALUE**: Verifies bad commands are logged and the connection survives.
///
/// **BUG THIS CATCHES**: Would catch the server dropping the renderer on an
/// unknown command or an invalid frame.
#[tokio::test]
async fn given_invalid_commands_when_sent_then_connection_stays_usable() {
    let server = start_test_server(RouteVariant::Standard).await;
    let mut ws = attach(server.handle.port(), SurfaceId::Main).await;

    send_command(&mut ws, "warp-speed", None).await;
    send_command(&mut ws, "user-text-input", None).await;
    send_frame(
        &mut ws,
        &ClientFrame::Hello {
            token: String::from(TEST_AUTH_TOKEN),
            surface: SurfaceId::AudioOverlay,
        },
    )
    .await;
    send_command(&mut ws, "print-screen", None).await;

    assert_eq!(
        wait_for_published(&server.broker, QUEUE_FALCON_SCREEN, 1).await,
        vec!["PRINT_SCREEN"]
    );
    assert!(server.broker.published(QUEUE_FALCON_ASK).await.is_empty());
}

// ============================================================================
// Forwarding Tests
// ============================================================================

/// **VALUE**: Verifies forwarded events reach the right renderer.
///
/// **WHY THIS MATTERS**: The control panel and the overlay are separate
/// connections; each must only see its own events.
#[tokio::test]
async fn given_two_renderers_when_forward_then_only_target_receives_event() {
    let server = start_test_server(RouteVariant::AudioOverlay).await;
    let mut main = attach(server.handle.port(), SurfaceId::Main).await;
    let mut overlay = attach(server.handle.port(), SurfaceId::AudioOverlay).await;
    wait_for_surface(&server.registry, SurfaceId::AudioOverlay, true).await;
    wait_for_surface(&server.registry, SurfaceId::Main, true).await;

    server
        .registry
        .forward(SurfaceId::AudioOverlay, "new-message-audio", "Listening")
        .await
        .unwrap();
    server
        .registry
        .forward(SurfaceId::Main, "new-message", "Answer")
        .await
        .unwrap();

    assert_eq!(
        receive_frame(&mut overlay).await,
        ServerFrame::Event {
            name: String::from("new-message-audio"),
            payload: String::from("Listening"),
        }
    );
    assert_eq!(
        receive_frame(&mut main).await,
        ServerFrame::Event {
            name: String::from("new-message"),
            payload: String::from("Answer"),
        }
    );
}

/// **VALUE**: Verifies the overlay sees its "Gravando" echo after start-record.
#[tokio::test]
async fn given_overlay_attached_when_start_record_then_overlay_receives_echo() {
    let server = start_test_server(RouteVariant::AudioOverlay).await;
    let mut main = attach(server.handle.port(), SurfaceId::Main).await;
    let mut overlay = attach(server.handle.port(), SurfaceId::AudioOverlay).await;
    wait_for_surface(&server.registry, SurfaceId::AudioOverlay, true).await;

    send_command(&mut main, "start-record", None).await;

    match receive_frame(&mut overlay).await {
        ServerFrame::Event { name, payload } => {
            assert_eq!(name, "new-message-audio");
            assert_eq!(payload, ECHO_RECORDING);
        }
        other => panic!("Expected Event, got {other:?}"),
    }
}

/// **VALUE**: Verifies a renderer's `new-message` is answered on its own connection.
///
/// **BUG THIS CATCHES**: Would catch the reply going to another surface, or
/// the message being published to a queue.
#[tokio::test]
async fn given_renderer_message_when_sent_then_sender_receives_reply() {
    let server = start_test_server(RouteVariant::AudioOverlay).await;
    let mut main = attach(server.handle.port(), SurfaceId::Main).await;
    wait_for_surface(&server.registry, SurfaceId::Main, true).await;

    send_command(&mut main, "new-message", Some("hello from the panel")).await;

    assert_eq!(
        receive_frame(&mut main).await,
        ServerFrame::Event {
            name: String::from(EVENT_REPLY),
            payload: String::from(REPLY_TEXT),
        }
    );
    assert_eq!(server.broker.operation_count(), 0);
}

/// **VALUE**: Verifies a disconnecting renderer is removed from the registry.
///
/// **BUG THIS CATCHES**: Would catch a dead connection staying registered and
/// messages being "forwarded" into the void.
#[tokio::test]
async fn given_renderer_when_disconnects_then_surface_unregistered() {
    let server = start_test_server(RouteVariant::AudioOverlay).await;
    let mut ws = attach(server.handle.port(), SurfaceId::Main).await;
    wait_for_surface(&server.registry, SurfaceId::Main, true).await;

    ws.close(None).await.expect("Failed to close");
    drop(ws);

    wait_for_surface(&server.registry, SurfaceId::Main, false).await;
}

/// **VALUE**: Verifies a reconnecting renderer replaces the old connection.
///
/// **WHY THIS MATTERS**: A reloaded window connects again before the old
/// socket's cleanup runs; the new one must keep receiving events.
#[tokio::test]
async fn given_reconnect_when_old_connection_closes_then_new_one_stays_registered() {
    let server = start_test_server(RouteVariant::AudioOverlay).await;
    let mut old = attach(server.handle.port(), SurfaceId::Main).await;
    wait_for_surface(&server.registry, SurfaceId::Main, true).await;
    let mut new = attach(server.handle.port(), SurfaceId::Main).await;

    // Let the server register the new connection before the old one leaves
    tokio::time::sleep(Duration::from_millis(100)).await;
    old.close(None).await.expect("Failed to close");
    drop(old);
    tokio::time::sleep(Duration::from_millis(100)).await;

    server
        .registry
        .forward(SurfaceId::Main, "new-message", "still here")
        .await
        .unwrap();

    assert_eq!(
        receive_frame(&mut new).await,
        ServerFrame::Event {
            name: String::from("new-message"),
            payload: String::from("still here"),
        }
    );
}
