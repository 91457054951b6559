use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum RouterError {
    #[error("Unknown Event Error: {event} {location}")]
    UnknownEvent {
        event: String,
        location: ErrorLocation,
    },

    #[error("Missing Payload Error: {event} {location}")]
    MissingPayload {
        event: String,
        location: ErrorLocation,
    },
}
