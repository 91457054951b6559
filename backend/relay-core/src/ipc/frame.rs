//! Wire frames exchanged with renderers.

use crate::error::ipc::IpcError;
use crate::surface::SurfaceId;

use common::ErrorLocation;

use std::panic::Location;

use serde::{Deserialize, Serialize};

/// Renderer → relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Authentication; must be the first frame on a connection.
    Hello { token: String, surface: SurfaceId },

    /// A UI command such as `start-record` or `user-text-input`.
    Command {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<String>,
    },
}

/// Relay → renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    HelloAck {
        accepted: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// A forwarded notification (`new-message`, `new-message-audio`).
    Event { name: String, payload: String },
}

#[track_caller]
pub fn decode_client_frame(text: &str) -> Result<ClientFrame, IpcError> {
    serde_json::from_str(text).map_err(|e| IpcError::Decode {
        message: format!("Invalid client frame: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })
}

#[track_caller]
pub fn encode_server_frame(frame: &ServerFrame) -> Result<String, IpcError> {
    serde_json::to_string(frame).map_err(|e| IpcError::Encode {
        message: format!("Failed to encode server frame: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })
}
