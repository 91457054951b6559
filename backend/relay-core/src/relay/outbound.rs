//! UI → broker forwarding.

use crate::broker::Broker;
use crate::error::relay::RelayError;
use crate::router::{CommandEvent, CommandRouter, LocalAction, Resolution};
use crate::surface::SurfaceRegistry;

use std::sync::Arc;

use log::{debug, info};

/// Result of dispatching one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Published on the named queue.
    Published { queue: &'static str },
    /// Must be carried out by the process; nothing was sent to the broker.
    Local(LocalAction),
    /// The sending surface should receive `text` as `event`.
    Reply {
        event: &'static str,
        text: &'static str,
    },
}

/// Publishes surface commands through the router onto the broker.
///
/// This type is `Clone`; clones share the broker client.
#[derive(Clone)]
pub struct OutboundRelay {
    broker: Arc<dyn Broker>,
    router: CommandRouter,
    registry: SurfaceRegistry,
}

impl OutboundRelay {
    pub fn new(broker: Arc<dyn Broker>, router: CommandRouter, registry: SurfaceRegistry) -> Self {
        Self {
            broker,
            router,
            registry,
        }
    }

    /// Parse a wire command and dispatch it.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Router`] if the name is unknown or a payload is missing
    /// - [`RelayError::Broker`] if the publish fails
    pub async fn dispatch_named(
        &self,
        name: &str,
        payload: Option<String>,
    ) -> Result<DispatchOutcome, RelayError> {
        let event = CommandEvent::parse(name, payload)?;
        self.dispatch(event).await
    }

    /// Resolve `event` and publish its payload.
    ///
    /// Local commands return [`DispatchOutcome::Local`] without touching the broker.
    /// After a successful publish the route's status echo, if any, is shown on
    /// its surface; a missing surface there is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Broker`] if the publish fails.
    pub async fn dispatch(&self, event: CommandEvent) -> Result<DispatchOutcome, RelayError> {
        match self.router.resolve(&event) {
            Resolution::Local(action) => {
                info!("Command '{}' handled locally: {action:?}", event.name());
                Ok(DispatchOutcome::Local(action))
            }
            Resolution::Reply { event: reply, text } => {
                if let Some(message) = event.argument() {
                    info!("Renderer says: {message}");
                }
                Ok(DispatchOutcome::Reply { event: reply, text })
            }
            Resolution::Publish {
                queue,
                payload,
                echo,
            } => {
                info!("Sending '{}' to queue '{queue}'", event.name());
                self.broker.publish(queue, payload.as_bytes()).await?;
                info!("Message sent to queue '{queue}'");

                if let Some(echo) = echo {
                    if let Err(e) = self
                        .registry
                        .forward(echo.surface, echo.event, echo.text)
                        .await
                    {
                        debug!("Status echo for '{}' not shown: {e}", event.name());
                    }
                }

                Ok(DispatchOutcome::Published { queue })
            }
        }
    }
}
