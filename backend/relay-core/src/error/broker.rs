use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum BrokerError {
    #[error("Connection Error: {message} {location}")]
    Connection {
        message: String,
        location: ErrorLocation,
    },

    #[error("Declaration Error: {queue}: {message} {location}")]
    Declaration {
        queue: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Publish Error: {queue}: {message} {location}")]
    Publish {
        queue: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Consume Error: {queue}: {message} {location}")]
    Consume {
        queue: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Ack Error: {queue} (delivery {delivery_tag}): {message} {location}")]
    Ack {
        queue: String,
        delivery_tag: u64,
        message: String,
        location: ErrorLocation,
    },
}

impl BrokerError {
    #[track_caller]
    pub(crate) fn connection(error: impl std::fmt::Display) -> Self {
        BrokerError::Connection {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub(crate) fn declaration(queue: &str, error: impl std::fmt::Display) -> Self {
        BrokerError::Declaration {
            queue: queue.to_string(),
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub(crate) fn publish(queue: &str, error: impl std::fmt::Display) -> Self {
        BrokerError::Publish {
            queue: queue.to_string(),
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub(crate) fn consume(queue: &str, error: impl std::fmt::Display) -> Self {
        BrokerError::Consume {
            queue: queue.to_string(),
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// True when the failure means the broker could not be reached at all.
    pub fn is_connection(&self) -> bool {
        matches!(self, BrokerError::Connection { .. })
    }
}
