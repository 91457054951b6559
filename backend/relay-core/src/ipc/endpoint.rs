//! Connection details published for renderers.
//!
//! The relay writes `ipc.json` (port + token) into the config directory at
//! startup; renderer processes read it to find and authenticate with the
//! IPC server.

use crate::error::config::ConfigError;
use crate::ipc::server::IPC_HOST;

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

const ENDPOINT_FILE_NAME: &str = "ipc.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcEndpoint {
    pub port: u16,
    pub auth_token: String,
}

impl IpcEndpoint {
    pub fn new(port: u16, auth_token: String) -> Self {
        Self { port, auth_token }
    }

    pub fn url(&self) -> String {
        format!("ws://{IPC_HOST}:{}", self.port)
    }

    /// Write {dir}/ipc.json atomically and return its path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the directory, the temp file or the rename fails.
    pub fn write(&self, dir: &Path) -> Result<PathBuf, ConfigError> {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: dir.to_path_buf(),
            source: e,
        })?;

        let path = dir.join(ENDPOINT_FILE_NAME);
        let temp_path = dir.join(format!("{ENDPOINT_FILE_NAME}.tmp"));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: path.clone(),
            source: e,
        })?;

        info!("IPC endpoint written to {}", path.display());
        Ok(path)
    }

    /// Read {dir}/ipc.json.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] or [`ConfigError::ParseError`].
    pub fn read(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(ENDPOINT_FILE_NAME);

        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
            location: ErrorLocation::from(Location::caller()),
            path: path.clone(),
            source: e,
        })?;

        serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
            location: ErrorLocation::from(Location::caller()),
            path,
            reason: e.to_string(),
        })
    }
}
