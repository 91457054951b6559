use common::ErrorLocation;

use serde::Serialize;
use thiserror::Error;

/// Errors that stop the overlay from starting.
///
/// Runtime failures (broker down, renderer gone) are logged by the relay and
/// never reach this type; only setup problems do.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum XwingError {
    /// Error from the application shell itself
    #[error("Xwing Error: {message} {location}")]
    Xwing {
        message: String,
        location: ErrorLocation,
    },

    /// Config could not be read, parsed or validated
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// Renderer IPC server could not be started or published
    #[error("Ipc Error: {message} {location}")]
    Ipc {
        message: String,
        location: ErrorLocation,
    },
}
