// Unit tests for per-connection auth state

use crate::ipc::connection_state::ConnectionState;
use crate::surface::SurfaceId;

#[test]
fn given_matching_token_when_authenticate_then_binds_surface() {
    let mut state = ConnectionState::new(String::from("secret"));

    assert!(state.authenticate("secret", SurfaceId::Main));
    assert_eq!(state.surface(), Some(SurfaceId::Main));
}

/// **VALUE**: Verifies a wrong token leaves the connection unbound.
///
/// **BUG THIS CATCHES**: Would catch a surface being recorded before the token
/// was checked.
#[test]
fn given_wrong_token_when_authenticate_then_rejected_and_unbound() {
    let mut state = ConnectionState::new(String::from("secret"));

    assert!(!state.authenticate("guess", SurfaceId::AudioOverlay));
    assert!(!state.authenticate("", SurfaceId::AudioOverlay));
    assert_eq!(state.surface(), None);
}
