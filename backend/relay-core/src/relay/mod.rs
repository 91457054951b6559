//! The message relay: inbound consumers and the outbound publisher.
//!
//! [`Relay`] wires a [`Broker`] to the [`SurfaceRegistry`] through the
//! [`CommandRouter`]. Starting it declares every routed queue and spawns one
//! consumer task per inbound route. Broker failures are logged here and never
//! propagate: an unreachable broker leaves the relay idle, not the process dead.
//!
//! A consumer whose delivery stream ends (channel closed, ack lost) subscribes
//! again after [`Relay::with_resubscribe_delay`]; its [`InboundRelay`] and the
//! unacked payloads it remembers carry over to the new subscription.

mod dedup;
mod inbound;
mod outbound;

pub use dedup::{ForwardedDigests, PayloadDigest};
pub use inbound::{ForwardOutcome, InboundRelay};
pub use outbound::{DispatchOutcome, OutboundRelay};

use crate::broker::{Broker, DeliveryStream};
use crate::error::broker::BrokerError;
use crate::router::CommandRouter;
use crate::surface::SurfaceRegistry;

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::task::JoinHandle;

pub const DEFAULT_DEDUP_WINDOW: usize = 256;

pub const DEFAULT_RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

pub struct Relay {
    broker: Arc<dyn Broker>,
    router: CommandRouter,
    registry: SurfaceRegistry,
    dedup_window: usize,
    resubscribe_delay: Duration,
}

impl Relay {
    pub fn new(
        broker: Arc<dyn Broker>,
        router: CommandRouter,
        registry: SurfaceRegistry,
        dedup_window: usize,
    ) -> Self {
        Self {
            broker,
            router,
            registry,
            dedup_window,
            resubscribe_delay: DEFAULT_RESUBSCRIBE_DELAY,
        }
    }

    /// How long a consumer waits before subscribing again after its stream ended.
    pub fn with_resubscribe_delay(mut self, delay: Duration) -> Self {
        self.resubscribe_delay = delay;
        self
    }

    pub fn router(&self) -> CommandRouter {
        self.router
    }

    pub fn outbound(&self) -> OutboundRelay {
        OutboundRelay::new(
            Arc::clone(&self.broker),
            self.router,
            self.registry.clone(),
        )
    }

    /// Declare every queue the router uses, stopping at the first failure.
    pub async fn declare_queues(&self) -> Result<(), BrokerError> {
        for queue in self.router.queues() {
            self.broker.declare_queue(queue).await?;
            info!("Queue asserted: {queue}");
        }
        Ok(())
    }

    /// Declare queues and start a consumer for every inbound route.
    ///
    /// Never fails: routes that cannot subscribe are logged and left inactive.
    pub async fn start(&self) -> RelayHandle {
        let mut consumers = Vec::new();

        if let Err(e) = self.declare_queues().await {
            if e.is_connection() {
                error!("Failed to connect to broker, inbound routes inactive: {e}");
                return RelayHandle {
                    consumers,
                    outbound: self.outbound(),
                };
            }
            error!("Failed to declare queues: {e}");
        }

        for route in self.router.inbound_routes() {
            match self.broker.subscribe(route.queue).await {
                Ok(deliveries) => {
                    let relay =
                        InboundRelay::new(*route, self.registry.clone(), self.dedup_window);
                    let task = tokio::spawn(consume(
                        Arc::clone(&self.broker),
                        relay,
                        deliveries,
                        self.resubscribe_delay,
                    ));
                    consumers.push((route.queue, task));
                }
                Err(e) => {
                    error!("Failed to subscribe to '{}': {e}", route.queue);
                }
            }
        }

        if consumers.is_empty() {
            warn!("No inbound routes active");
        } else {
            info!("{} inbound route(s) active", consumers.len());
        }

        RelayHandle {
            consumers,
            outbound: self.outbound(),
        }
    }
}

/// Run `relay` on `deliveries`, subscribing again whenever the stream ends.
async fn consume(
    broker: Arc<dyn Broker>,
    mut relay: InboundRelay,
    mut deliveries: DeliveryStream,
    delay: Duration,
) {
    let queue = relay.route().queue;

    loop {
        relay.run(deliveries).await;

        deliveries = loop {
            tokio::time::sleep(delay).await;
            match broker.subscribe(queue).await {
                Ok(deliveries) => {
                    info!(
                        "Resubscribed to '{queue}' ({} pending redeliveries)",
                        relay.pending_redeliveries()
                    );
                    break deliveries;
                }
                Err(e) => warn!("Failed to resubscribe to '{queue}', retrying: {e}"),
            }
        };
    }
}

/// Running relay: consumer tasks plus the outbound publisher.
pub struct RelayHandle {
    consumers: Vec<(&'static str, JoinHandle<()>)>,
    outbound: OutboundRelay,
}

impl RelayHandle {
    pub fn outbound(&self) -> &OutboundRelay {
        &self.outbound
    }

    /// Queues whose consumer task is still running.
    pub fn active_queues(&self) -> Vec<&'static str> {
        self.consumers
            .iter()
            .filter(|(_, task)| !task.is_finished())
            .map(|(queue, _)| *queue)
            .collect()
    }

    /// Stop every consumer task.
    pub fn shutdown(self) {
        for (queue, task) in self.consumers {
            task.abort();
            info!("Stopped consumer for '{queue}'");
        }
    }
}
