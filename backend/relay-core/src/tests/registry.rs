// Unit tests for the surface registry

use crate::error::surface::SurfaceError;
use crate::surface::{SurfaceId, SurfaceRegistry};
use crate::tests::support::RecordingSurface;

use std::sync::Arc;

/// **VALUE**: Verifies a registered surface receives forwarded events.
#[tokio::test]
async fn given_registered_surface_when_forward_then_surface_receives_event() {
    // GIVEN: A main surface
    let registry = SurfaceRegistry::new();
    let surface = Arc::new(RecordingSurface::new(SurfaceId::Main));
    registry.register(SurfaceId::Main, surface.clone()).await;

    // WHEN: Forwarding an event
    registry
        .forward(SurfaceId::Main, "new-message", "hello")
        .await
        .unwrap();

    // THEN: The surface recorded it
    assert_eq!(
        surface.events(),
        vec![(String::from("new-message"), String::from("hello"))]
    );
}

/// **VALUE**: Verifies forwarding to an absent surface is an Unavailable error.
///
/// **BUG THIS CATCHES**: Would catch a panic or silent success when the
/// overlay window was never opened.
#[tokio::test]
async fn given_no_surface_when_forward_then_returns_unavailable() {
    let registry = SurfaceRegistry::new();

    let err = registry
        .forward(SurfaceId::AudioOverlay, "new-message-audio", "x")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SurfaceError::Unavailable {
            surface: SurfaceId::AudioOverlay,
            ..
        }
    ));
}

/// **VALUE**: Verifies a dead renderer is reported as Closed and hidden from `get`.
///
/// **WHY THIS MATTERS**: A window may close between registration and the next
/// broker message; forwarding must fail cleanly.
#[tokio::test]
async fn given_closed_surface_when_forward_then_returns_closed() {
    let registry = SurfaceRegistry::new();
    let surface = Arc::new(RecordingSurface::new(SurfaceId::Main));
    registry.register(SurfaceId::Main, surface.clone()).await;

    surface.close();

    let err = registry
        .forward(SurfaceId::Main, "new-message", "x")
        .await
        .unwrap_err();
    assert!(matches!(err, SurfaceError::Closed { .. }));
    assert!(registry.get(SurfaceId::Main).await.is_none());
    assert!(registry.live_surfaces().await.is_empty());
}

/// **VALUE**: Verifies a stale unregister does not remove a newer surface.
///
/// **WHY THIS MATTERS**: A renderer that reconnects registers again before the
/// old connection's cleanup runs.
///
/// **BUG THIS CATCHES**: Would catch unregister removing by id alone.
#[tokio::test]
async fn given_replaced_surface_when_old_instance_unregisters_then_new_one_stays() {
    let registry = SurfaceRegistry::new();
    let old = Arc::new(RecordingSurface::new(SurfaceId::Main));
    let new = Arc::new(RecordingSurface::new(SurfaceId::Main));

    let old_instance = registry.register(SurfaceId::Main, old.clone()).await;
    let new_instance = registry.register(SurfaceId::Main, new.clone()).await;

    assert!(!registry.unregister(SurfaceId::Main, old_instance).await);
    registry
        .forward(SurfaceId::Main, "new-message", "after")
        .await
        .unwrap();

    assert!(old.events().is_empty());
    assert_eq!(new.events().len(), 1);
    assert!(registry.unregister(SurfaceId::Main, new_instance).await);
    assert!(registry.get(SurfaceId::Main).await.is_none());
}

#[tokio::test]
async fn given_two_surfaces_when_live_surfaces_then_lists_both_in_order() {
    let registry = SurfaceRegistry::new();
    registry
        .register(
            SurfaceId::AudioOverlay,
            Arc::new(RecordingSurface::new(SurfaceId::AudioOverlay)),
        )
        .await;
    registry
        .register(SurfaceId::Main, Arc::new(RecordingSurface::new(SurfaceId::Main)))
        .await;

    assert_eq!(
        registry.live_surfaces().await,
        vec![SurfaceId::Main, SurfaceId::AudioOverlay]
    );
}
