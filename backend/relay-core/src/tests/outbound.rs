// Unit tests for UI → broker forwarding

use crate::broker::MemoryBroker;
use crate::error::relay::RelayError;
use crate::error::router::RouterError;
use crate::relay::{DispatchOutcome, OutboundRelay};
use crate::router::{
    CommandEvent, CommandRouter, ECHO_RECORDING, EVENT_REPLY, LocalAction, REPLY_TEXT,
    RouteVariant,
};
use crate::surface::{SurfaceId, SurfaceRegistry};
use crate::tests::support::RecordingSurface;
use crate::{QUEUE_FALCON_ASK, QUEUE_FALCON_AUDIO, QUEUE_FALCON_SCREEN};

use std::sync::Arc;

fn relay_for(broker: &MemoryBroker, variant: RouteVariant) -> (OutboundRelay, SurfaceRegistry) {
    let registry = SurfaceRegistry::new();
    let relay = OutboundRelay::new(
        Arc::new(broker.clone()),
        CommandRouter::new(variant),
        registry.clone(),
    );
    (relay, registry)
}

/// **VALUE**: Verifies each command lands on its queue with its payload.
///
/// **WHY THIS MATTERS**: The agents only see the queue contents; a wrong queue
/// or keyword means a button does nothing.
#[tokio::test]
async fn given_commands_when_dispatch_then_published_to_their_queues() {
    let broker = MemoryBroker::new();
    let (relay, _registry) = relay_for(&broker, RouteVariant::Standard);

    relay.dispatch(CommandEvent::StartRecord).await.unwrap();
    relay.dispatch(CommandEvent::StopRecord).await.unwrap();
    relay.dispatch(CommandEvent::PrintScreen).await.unwrap();
    relay
        .dispatch(CommandEvent::UserTextInput(String::from("why?")))
        .await
        .unwrap();

    assert_eq!(
        broker.published(QUEUE_FALCON_AUDIO).await,
        vec!["START_RECORD", "STOP_RECORD"]
    );
    assert_eq!(
        broker.published(QUEUE_FALCON_SCREEN).await,
        vec!["PRINT_SCREEN"]
    );
    assert_eq!(
        broker.published(QUEUE_FALCON_ASK).await,
        vec!["Help with this problem:\n\nwhy?\n"]
    );
}

/// **VALUE**: Verifies the outcome names the queue used.
#[tokio::test]
async fn given_print_screen_when_dispatch_named_then_returns_published_outcome() {
    let broker = MemoryBroker::new();
    let (relay, _registry) = relay_for(&broker, RouteVariant::Standard);

    let outcome = relay.dispatch_named("print-screen", None).await.unwrap();

    assert_eq!(
        outcome,
        DispatchOutcome::Published {
            queue: QUEUE_FALCON_SCREEN
        }
    );
}

/// **VALUE**: Verifies close-app performs no broker operation.
///
/// **BUG THIS CATCHES**: Would catch close-app being published, or the broker
/// being touched (and failing) while the user is quitting.
#[tokio::test]
async fn given_close_app_when_dispatch_then_local_quit_without_broker_calls() {
    let broker = MemoryBroker::new();
    let (relay, _registry) = relay_for(&broker, RouteVariant::AudioOverlay);

    let outcome = relay.dispatch_named("close-app", None).await.unwrap();

    assert_eq!(outcome, DispatchOutcome::Local(LocalAction::Quit));
    assert_eq!(broker.operation_count(), 0);
}

/// **VALUE**: Verifies a renderer message yields a reply and no broker call.
#[tokio::test]
async fn given_renderer_message_when_dispatch_named_then_reply_without_broker_calls() {
    let broker = MemoryBroker::new();
    let (relay, _registry) = relay_for(&broker, RouteVariant::Standard);

    let outcome = relay
        .dispatch_named("new-message", Some(String::from("hello core")))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        DispatchOutcome::Reply {
            event: EVENT_REPLY,
            text: REPLY_TEXT,
        }
    );
    assert_eq!(broker.operation_count(), 0);
}

/// **VALUE**: Verifies unknown commands surface a router error and publish nothing.
#[tokio::test]
async fn given_unknown_command_when_dispatch_named_then_router_error() {
    let broker = MemoryBroker::new();
    let (relay, _registry) = relay_for(&broker, RouteVariant::Standard);

    let err = relay.dispatch_named("warp-speed", None).await.unwrap_err();

    assert!(matches!(
        err,
        RelayError::Router(RouterError::UnknownEvent { .. })
    ));
    assert_eq!(broker.operation_count(), 0);
}

/// **VALUE**: Verifies publish failures are returned, not swallowed.
///
/// **WHY THIS MATTERS**: The IPC layer logs the failure; the process must keep
/// running and the error must say which queue failed.
#[tokio::test]
async fn given_unreachable_broker_when_dispatch_then_broker_error() {
    let broker = MemoryBroker::unreachable();
    let (relay, _registry) = relay_for(&broker, RouteVariant::Standard);

    let err = relay.dispatch(CommandEvent::PrintScreen).await.unwrap_err();

    match err {
        RelayError::Broker(e) => assert!(e.is_connection()),
        other => panic!("Expected broker error, got {other:?}"),
    }
}

/// **VALUE**: Verifies the overlay echo follows a successful publish.
///
/// **WHY THIS MATTERS**: The overlay shows recorder state right away, before
/// the recorder agent replies.
#[tokio::test]
async fn given_overlay_variant_when_start_record_then_echoes_to_overlay() {
    let broker = MemoryBroker::new();
    let (relay, registry) = relay_for(&broker, RouteVariant::AudioOverlay);
    let overlay = Arc::new(RecordingSurface::new(SurfaceId::AudioOverlay));
    registry
        .register(SurfaceId::AudioOverlay, overlay.clone())
        .await;

    relay.dispatch(CommandEvent::StartRecord).await.unwrap();

    let events = overlay.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "new-message-audio");
    assert_eq!(events[0].1, ECHO_RECORDING);
}

/// **VALUE**: Verifies no echo is shown when the publish failed.
///
/// **BUG THIS CATCHES**: Would catch "Gravando..." being shown while nothing
/// actually reached the recorder.
#[tokio::test]
async fn given_failed_publish_when_start_record_then_no_echo() {
    let broker = MemoryBroker::unreachable();
    let (relay, registry) = relay_for(&broker, RouteVariant::AudioOverlay);
    let overlay = Arc::new(RecordingSurface::new(SurfaceId::AudioOverlay));
    registry
        .register(SurfaceId::AudioOverlay, overlay.clone())
        .await;

    assert!(relay.dispatch(CommandEvent::StartRecord).await.is_err());

    assert!(overlay.events().is_empty());
}

/// **VALUE**: Verifies a missing overlay does not fail the publish.
#[tokio::test]
async fn given_no_overlay_when_start_record_then_publish_still_succeeds() {
    let broker = MemoryBroker::new();
    let (relay, _registry) = relay_for(&broker, RouteVariant::AudioOverlay);

    let outcome = relay.dispatch(CommandEvent::StartRecord).await.unwrap();

    assert_eq!(
        outcome,
        DispatchOutcome::Published {
            queue: QUEUE_FALCON_AUDIO
        }
    );
}

/// **VALUE**: Verifies the standard variant shows no echo.
#[tokio::test]
async fn given_standard_variant_when_start_record_then_no_echo() {
    let broker = MemoryBroker::new();
    let (relay, registry) = relay_for(&broker, RouteVariant::Standard);
    let overlay = Arc::new(RecordingSurface::new(SurfaceId::AudioOverlay));
    registry
        .register(SurfaceId::AudioOverlay, overlay.clone())
        .await;

    relay.dispatch(CommandEvent::StartRecord).await.unwrap();

    assert!(overlay.events().is_empty());
    assert_eq!(broker.declarations(QUEUE_FALCON_AUDIO).await, 1);
}
