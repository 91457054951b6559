//! Connection state tracking for authentication.
//!
//! This module provides per-connection state to track whether a renderer
//! has authenticated with the IPC server and which surface it claimed.

use crate::surface::SurfaceId;

/// Connection state for auth tracking.
pub(crate) struct ConnectionState {
    expected_token: String,
    surface: Option<SurfaceId>,
}

impl ConnectionState {
    /// Create new connection state with expected token.
    pub(crate) fn new(token: String) -> Self {
        Self {
            expected_token: token,
            surface: None,
        }
    }

    /// Validate token and bind the connection to `surface` if correct.
    ///
    /// Returns true if token matches, false otherwise.
    pub(crate) fn authenticate(&mut self, token: &str, surface: SurfaceId) -> bool {
        if token == self.expected_token {
            self.surface = Some(surface);
            true
        } else {
            false
        }
    }

    /// The surface this connection authenticated as, if it has.
    pub(crate) fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }
}
