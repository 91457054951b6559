//! [`Surface`] backed by a renderer's WebSocket connection.

use crate::error::surface::SurfaceError;
use crate::ipc::frame::ServerFrame;
use crate::surface::{Surface, SurfaceId};

use common::ErrorLocation;

use std::panic::Location;

use tokio::sync::mpsc;

/// Queues frames for the connection's writer task.
///
/// Alive until the writer task ends (socket closed or write failed).
pub struct WsSurface {
    id: SurfaceId,
    frames: mpsc::UnboundedSender<ServerFrame>,
}

impl WsSurface {
    pub fn new(id: SurfaceId, frames: mpsc::UnboundedSender<ServerFrame>) -> Self {
        Self { id, frames }
    }
}

impl Surface for WsSurface {
    fn is_alive(&self) -> bool {
        !self.frames.is_closed()
    }

    fn emit(&self, event: &str, payload: &str) -> Result<(), SurfaceError> {
        self.frames
            .send(ServerFrame::Event {
                name: event.to_string(),
                payload: payload.to_string(),
            })
            .map_err(|_| SurfaceError::Closed {
                surface: self.id,
                message: String::from("renderer connection closed"),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}
