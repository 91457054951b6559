//! UI surfaces: the renderer destinations that receive forwarded messages.
//!
//! A surface is anything that can accept a named notification with a string
//! payload. Renderers attached over IPC are the production implementation;
//! tests inject their own.

mod registry;

pub use registry::SurfaceRegistry;

use crate::error::surface::SurfaceError;

use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::{Deserialize, Serialize};

/// Identifies one of the two renderer destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceId {
    /// Control panel window.
    Main,
    /// Audio status overlay.
    AudioOverlay,
}

impl SurfaceId {
    pub const ALL: [SurfaceId; 2] = [SurfaceId::Main, SurfaceId::AudioOverlay];

    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceId::Main => "main",
            SurfaceId::AudioOverlay => "audio_overlay",
        }
    }
}

impl Display for SurfaceId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.as_str())
    }
}

/// A live renderer destination.
pub trait Surface: Send + Sync {
    /// Whether the renderer behind this surface can still receive events.
    fn is_alive(&self) -> bool;

    /// Deliver a named notification.
    ///
    /// Must not block; implementations hand the event to their own writer.
    fn emit(&self, event: &str, payload: &str) -> Result<(), SurfaceError>;
}
