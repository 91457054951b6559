use crate::surface::SurfaceId;

use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SurfaceError {
    /// No surface is registered under the id.
    #[error("Surface Unavailable Error: {surface} {location}")]
    Unavailable {
        surface: SurfaceId,
        location: ErrorLocation,
    },

    /// A surface is registered but its renderer has gone away.
    #[error("Surface Closed Error: {surface}: {message} {location}")]
    Closed {
        surface: SurfaceId,
        message: String,
        location: ErrorLocation,
    },
}
