use crate::broker::ConnectionMode;
use crate::error::config::ConfigError;
use crate::relay::DEFAULT_DEDUP_WINDOW;
use crate::router::RouteVariant;
use crate::{APP_NAME, BROKER_DEFAULT_URI, BROKER_URI_ENV};

use common::{ErrorLocation, RedactedUri};

use std::fmt;
use std::panic::Location;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use url::Url;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_VERSION: u32 = 1;

pub const DEFAULT_IPC_PORT: u16 = 19876;
const MAX_DEDUP_WINDOW: usize = 65_536;
const BROKER_SCHEMES: [&str; 2] = ["amqp", "amqps"];
const REDACTED_TOKEN: &str = "***";

// ============================================
// ENUMS WITH DEFAULTS
// ============================================

/// Which broker client the overlay talks to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BrokerBackend {
    #[default]
    Amqp,
    /// In-process queues; nothing leaves the process.
    Memory,
}

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_uri")]
    pub uri: String,
    #[serde(default)]
    pub connection_mode: ConnectionMode,
    #[serde(default)]
    pub backend: BrokerBackend,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            uri: default_broker_uri(),
            connection_mode: ConnectionMode::default(),
            backend: BrokerBackend::default(),
        }
    }
}

// Manual impl keeps the broker password out of debug logs.
impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("uri", &RedactedUri::new(self.uri.clone()))
            .field("connection_mode", &self.connection_mode)
            .field("backend", &self.backend)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct IpcSettings {
    #[serde(default = "default_ipc_port")]
    pub port: u16,
    /// Fixed renderer token; a random one is generated per run when unset.
    pub auth_token: Option<String>,
}

impl Default for IpcSettings {
    fn default() -> Self {
        Self {
            port: default_ipc_port(),
            auth_token: None,
        }
    }
}

// Manual impl keeps a fixed renderer token out of debug logs.
impl fmt::Debug for IpcSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpcSettings")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| REDACTED_TOKEN))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    #[serde(default)]
    pub variant: RouteVariant,
    #[serde(default = "default_dedup_window")]
    pub dedup_window: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            variant: RouteVariant::default(),
            dedup_window: default_dedup_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub ipc: IpcSettings,

    #[serde(default)]
    pub relay: RelaySettings,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            broker: BrokerConfig::default(),
            ipc: IpcSettings::default(),
            relay: RelaySettings::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_broker_uri() -> String {
    BROKER_DEFAULT_URI.to_string()
}
fn default_ipc_port() -> u16 {
    DEFAULT_IPC_PORT
}
fn default_dedup_window() -> usize {
    DEFAULT_DEDUP_WINDOW
}

// ============================================
// IMPLEMENTATION
// ============================================

impl RelayConfig {
    /// Platform config directory for the overlay (`~/.config/x-wing` on Linux).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DirectoryNotFound`] if the platform has no config dir.
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or(ConfigError::DirectoryNotFound {
                location: ErrorLocation::from(Location::caller()),
            })
    }

    /// Load config from {config_dir}/config.json.
    ///
    /// # Returns
    ///
    /// Returns `Ok(RelayConfig)` if loaded successfully or defaults if file missing.
    /// Returns `Err(ConfigError)` if file exists but is corrupted/invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: RelayConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/config.json using atomic write.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation, serialization, the write or the
    /// rename fails.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        // Atomic rename (POSIX guarantees atomicity)
        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Load a `.env` file from the working directory or its parents, if any.
    ///
    /// Variables already set in the environment win over the file.
    pub fn load_env_file() -> Option<PathBuf> {
        match dotenvy::dotenv() {
            Ok(path) => {
                info!("Loaded environment from {}", path.display());
                Some(path)
            }
            Err(e) if e.not_found() => None,
            Err(e) => {
                warn!("Ignoring unreadable .env file: {e}");
                None
            }
        }
    }

    /// Apply `RABBITMQ_URI` from the environment over the file value.
    ///
    /// Empty values are ignored. Call [`RelayConfig::validate`] afterwards.
    pub fn apply_env_overrides(&mut self) {
        match std::env::var(BROKER_URI_ENV) {
            Ok(uri) if !uri.trim().is_empty() => {
                let uri = uri.trim().to_string();
                info!(
                    "Broker URI overridden by {BROKER_URI_ENV}: {}",
                    RedactedUri::new(uri.clone())
                );
                self.broker.uri = uri;
            }
            _ => {}
        }
    }

    pub fn broker_uri(&self) -> RedactedUri {
        RedactedUri::new(self.broker.uri.clone())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        validate_broker_uri(&self.broker.uri)?;

        if self.relay.dedup_window == 0 || self.relay.dedup_window > MAX_DEDUP_WINDOW {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid dedup window: {} (must be 1-{})",
                    self.relay.dedup_window, MAX_DEDUP_WINDOW
                ),
            });
        }

        if let Some(ref token) = self.ipc.auth_token {
            if token.trim().is_empty() {
                return Err(ConfigError::ValidationError {
                    location: ErrorLocation::from(Location::caller()),
                    reason: "ipc.auth_token cannot be empty string".to_string(),
                });
            }
        }

        Ok(())
    }
}

fn validate_broker_uri(uri: &str) -> Result<(), ConfigError> {
    let redacted = RedactedUri::new(uri.to_string());

    let parsed = Url::parse(uri).map_err(|e| ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason: format!("Invalid broker URI {redacted}: {e}"),
    })?;

    if !BROKER_SCHEMES.contains(&parsed.scheme()) {
        return Err(ConfigError::ValidationError {
            location: ErrorLocation::from(Location::caller()),
            reason: format!(
                "Invalid broker URI scheme '{}' (expected amqp or amqps)",
                parsed.scheme()
            ),
        });
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::ValidationError {
            location: ErrorLocation::from(Location::caller()),
            reason: format!("Broker URI has no host: {redacted}"),
        });
    }

    Ok(())
}
