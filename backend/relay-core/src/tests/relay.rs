// Unit tests for relay startup and shutdown

use crate::broker::{Broker, MemoryBroker};
use crate::relay::Relay;
use crate::router::{CommandRouter, RouteVariant};
use crate::surface::{SurfaceId, SurfaceRegistry};
use crate::tests::support::RecordingSurface;
use crate::{
    QUEUE_FALCON_ASK, QUEUE_FALCON_AUDIO, QUEUE_FALCON_SCREEN, QUEUE_FALCON_X_WING,
    QUEUE_FALCON_X_WING_AUDIO,
};

use std::sync::Arc;
use std::time::Duration;

fn relay(broker: &MemoryBroker, variant: RouteVariant, registry: SurfaceRegistry) -> Relay {
    Relay::new(
        Arc::new(broker.clone()),
        CommandRouter::new(variant),
        registry,
        16,
    )
}

async fn wait_for_events(surface: &RecordingSurface, count: usize) {
    for _ in 0..50 {
        if surface.events().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// **VALUE**: Verifies startup declares all five queues.
///
/// **WHY THIS MATTERS**: The agents publish to queues they expect to exist; the
/// overlay is the one component that always creates them.
#[tokio::test]
async fn given_overlay_variant_when_start_then_declares_every_queue() {
    let broker = MemoryBroker::new();

    let handle = relay(&broker, RouteVariant::AudioOverlay, SurfaceRegistry::new())
        .start()
        .await;

    for queue in [
        QUEUE_FALCON_X_WING,
        QUEUE_FALCON_X_WING_AUDIO,
        QUEUE_FALCON_AUDIO,
        QUEUE_FALCON_SCREEN,
        QUEUE_FALCON_ASK,
    ] {
        assert!(
            broker.declarations(queue).await >= 1,
            "{queue} should be declared"
        );
    }
    assert_eq!(
        handle.active_queues(),
        vec![QUEUE_FALCON_X_WING, QUEUE_FALCON_X_WING_AUDIO]
    );

    handle.shutdown();
}

/// **VALUE**: Verifies a started relay forwards broker messages to surfaces.
///
/// **BUG THIS CATCHES**: Would catch consumers that are spawned but never polled.
#[tokio::test]
async fn given_started_relay_when_message_published_then_surface_receives_it() {
    let broker = MemoryBroker::new();
    let registry = SurfaceRegistry::new();
    let surface = Arc::new(RecordingSurface::new(SurfaceId::Main));
    registry.register(SurfaceId::Main, surface.clone()).await;

    let handle = relay(&broker, RouteVariant::Standard, registry)
        .start()
        .await;

    broker
        .publish(QUEUE_FALCON_X_WING, b"from the assistant")
        .await
        .unwrap();
    wait_for_events(&surface, 1).await;

    assert_eq!(
        surface.events(),
        vec![(
            String::from("new-message"),
            String::from("from the assistant")
        )]
    );

    handle.shutdown();
}

/// **VALUE**: Verifies a consumer subscribes again after its stream ends.
///
/// **WHY THIS MATTERS**: A lost ack closes the AMQP channel and ends the
/// consumer. Without a new subscription the queue stops being relayed until
/// the overlay restarts, and the requeued message is never seen.
///
/// **BUG THIS CATCHES**: Would catch a consumer task that exits for good, or a
/// resubscription that starts with a fresh relay and shows the requeued
/// message a second time.
#[tokio::test]
async fn given_lost_ack_when_stream_ends_then_resubscribes_and_skips_redelivery() {
    // GIVEN: A running relay whose next ack fails
    let broker = MemoryBroker::new();
    let registry = SurfaceRegistry::new();
    let surface = Arc::new(RecordingSurface::new(SurfaceId::Main));
    registry.register(SurfaceId::Main, surface.clone()).await;
    let handle = relay(&broker, RouteVariant::Standard, registry)
        .with_resubscribe_delay(Duration::from_millis(10))
        .start()
        .await;
    broker.fail_next_acks(1);

    // WHEN: A message arrives, then another after the resubscription
    broker
        .publish(QUEUE_FALCON_X_WING, b"only once")
        .await
        .unwrap();
    let acked = broker
        .wait_for_acks(QUEUE_FALCON_X_WING, 1, Duration::from_secs(2))
        .await;
    broker
        .publish(QUEUE_FALCON_X_WING, b"still listening")
        .await
        .unwrap();
    wait_for_events(&surface, 2).await;

    // THEN: The redelivery was acked silently and the queue is still relayed
    assert_eq!(acked, vec![2]);
    assert_eq!(
        surface.events(),
        vec![
            (String::from("new-message"), String::from("only once")),
            (String::from("new-message"), String::from("still listening")),
        ]
    );
    assert!(handle.active_queues().contains(&QUEUE_FALCON_X_WING));

    handle.shutdown();
}

/// **VALUE**: Verifies an unreachable broker leaves the relay idle instead of failing.
///
/// **WHY THIS MATTERS**: The overlay must still open when RabbitMQ is down.
///
/// **BUG THIS CATCHES**: Would catch subscriptions being attempted after the
/// connection already failed (one error per route instead of one overall).
#[tokio::test]
async fn given_unreachable_broker_when_start_then_no_consumers_and_no_subscribe() {
    let broker = MemoryBroker::unreachable();

    let handle = relay(&broker, RouteVariant::AudioOverlay, SurfaceRegistry::new())
        .start()
        .await;

    assert!(handle.active_queues().is_empty());
    assert_eq!(broker.operation_count(), 1);
}

/// **VALUE**: Verifies a declaration conflict still lets other routes start.
#[tokio::test]
async fn given_conflicting_queue_when_start_then_other_routes_still_consume() {
    let broker = MemoryBroker::new()
        .with_transient_queue(QUEUE_FALCON_X_WING_AUDIO)
        .await;

    let handle = relay(&broker, RouteVariant::AudioOverlay, SurfaceRegistry::new())
        .start()
        .await;

    assert_eq!(handle.active_queues(), vec![QUEUE_FALCON_X_WING]);

    handle.shutdown();
}

/// **VALUE**: Verifies the handle's outbound relay publishes through the same broker.
#[tokio::test]
async fn given_started_relay_when_outbound_dispatch_then_published() {
    let broker = MemoryBroker::new();
    let handle = relay(&broker, RouteVariant::Standard, SurfaceRegistry::new())
        .start()
        .await;

    handle
        .outbound()
        .dispatch_named("print-screen", None)
        .await
        .unwrap();

    assert_eq!(
        broker.published(QUEUE_FALCON_SCREEN).await,
        vec!["PRINT_SCREEN"]
    );

    handle.shutdown();
}

#[tokio::test]
async fn given_declare_queues_when_called_twice_then_idempotent() {
    let broker = MemoryBroker::new();
    let relay = relay(&broker, RouteVariant::Standard, SurfaceRegistry::new());

    relay.declare_queues().await.unwrap();
    relay.declare_queues().await.unwrap();

    assert_eq!(broker.declarations(QUEUE_FALCON_X_WING).await, 2);
    assert_eq!(broker.queue_count().await, 4);
    assert_eq!(relay.router().variant(), RouteVariant::Standard);
}
