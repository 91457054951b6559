// Shared fakes for relay-core unit tests

use crate::error::surface::SurfaceError;
use crate::surface::{Surface, SurfaceId};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Surface that records every notification it receives.
pub struct RecordingSurface {
    id: SurfaceId,
    alive: AtomicBool,
    events: Mutex<Vec<(String, String)>>,
}

impl RecordingSurface {
    pub fn new(id: SurfaceId) -> Self {
        Self {
            id,
            alive: AtomicBool::new(true),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<(String, String)> {
        self.events.lock().unwrap().clone()
    }
}

impl Surface for RecordingSurface {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn emit(&self, event: &str, payload: &str) -> Result<(), SurfaceError> {
        if !self.is_alive() {
            return Err(SurfaceError::Closed {
                surface: self.id,
                message: String::from("test surface closed"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        self.events
            .lock()
            .unwrap()
            .push((event.to_string(), payload.to_string()));
        Ok(())
    }
}
