pub mod broker;
pub mod config;
pub mod error;
pub mod ipc;
pub mod relay;
pub mod router;
pub mod surface;

#[cfg(test)]
mod tests;

pub const APP_NAME: &str = "x-wing";

pub const BROKER_DEFAULT_HOST: &str = "localhost";
pub const BROKER_DEFAULT_PORT: u16 = 5672;
pub const BROKER_DEFAULT_URI: &str =
    const_format::concatcp!("amqp://falcon:falcon@", BROKER_DEFAULT_HOST, ":", BROKER_DEFAULT_PORT);

/// Environment variable that overrides the configured broker URI.
pub const BROKER_URI_ENV: &str = "RABBITMQ_URI";

/// Inbound: replies for the control panel.
pub const QUEUE_FALCON_X_WING: &str = "QUEUE_FALCON_X_WING";
/// Inbound: status text for the audio overlay.
pub const QUEUE_FALCON_X_WING_AUDIO: &str = "QUEUE_FALCON_X_WING_AUDIO";
/// Outbound: recorder control keywords.
pub const QUEUE_FALCON_AUDIO: &str = "QUEUE_FALCON_AUDIO";
/// Outbound: prompts for the assistant.
pub const QUEUE_FALCON_ASK: &str = "QUEUE_FALCON_ASK";
/// Outbound: screenshot triggers.
pub const QUEUE_FALCON_SCREEN: &str = "QUEUE_FALCON_SCREEN";
