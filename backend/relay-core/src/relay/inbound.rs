//! Broker → UI forwarding for one inbound route.

use crate::broker::{Delivery, DeliveryStream};
use crate::relay::dedup::ForwardedDigests;
use crate::router::InboundRoute;
use crate::surface::SurfaceRegistry;

use futures_util::StreamExt;
use log::{debug, error, info, warn};

/// What happened to a delivery before it was acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Handed to the route's surface.
    Forwarded,
    /// No live surface; the message was dropped.
    SurfaceUnavailable,
    /// A redelivery of a payload already forwarded whose ack was lost; not shown again.
    Duplicate,
}

pub struct InboundRelay {
    route: InboundRoute,
    registry: SurfaceRegistry,
    unacked: ForwardedDigests,
}

impl InboundRelay {
    pub fn new(route: InboundRoute, registry: SurfaceRegistry, dedup_window: usize) -> Self {
        Self {
            route,
            registry,
            unacked: ForwardedDigests::new(dedup_window),
        }
    }

    pub fn route(&self) -> &InboundRoute {
        &self.route
    }

    /// Forward one delivery, then acknowledge it whatever the outcome.
    ///
    /// A failed ack means the channel is gone and the broker will redeliver.
    /// The payload is remembered so that redelivery is acked without being
    /// shown a second time.
    pub async fn handle(&mut self, delivery: Delivery) -> ForwardOutcome {
        let text = delivery.text();
        let digest = ForwardedDigests::digest(delivery.payload());
        let queue = self.route.queue;
        let surface = self.route.surface;

        info!(
            "Message received on '{queue}' (delivery {}, {} bytes)",
            delivery.delivery_tag(),
            delivery.payload().len()
        );
        debug!("Message content: {text}");

        let outcome = if delivery.redelivered() && self.unacked.remove(&digest) {
            info!(
                "Skipping redelivered duplicate {} on '{queue}'",
                delivery.delivery_tag()
            );
            ForwardOutcome::Duplicate
        } else {
            match self.registry.forward(surface, self.route.event, &text).await {
                Ok(()) => ForwardOutcome::Forwarded,
                Err(e) => {
                    warn!("Dropping message from '{queue}': {e}");
                    ForwardOutcome::SurfaceUnavailable
                }
            }
        };

        let delivery_tag = delivery.delivery_tag();
        if let Err(e) = delivery.ack().await {
            error!("Failed to ack delivery {delivery_tag} on '{queue}': {e}");
            if outcome != ForwardOutcome::SurfaceUnavailable {
                self.unacked.record(digest);
            }
        }

        outcome
    }

    /// Payloads shown but not acked, awaiting their redelivery.
    pub fn pending_redeliveries(&self) -> usize {
        self.unacked.len()
    }

    /// Drain `deliveries` until the stream ends or fails.
    ///
    /// Returns how many deliveries were handled. The relay keeps its state, so
    /// it can be run again on a fresh subscription.
    pub async fn run(&mut self, mut deliveries: DeliveryStream) -> usize {
        let queue = self.route.queue;
        let mut handled = 0;

        info!(
            "Listening on '{queue}' for {} ({})",
            self.route.surface, self.route.event
        );

        while let Some(item) = deliveries.next().await {
            match item {
                Ok(delivery) => {
                    self.handle(delivery).await;
                    handled += 1;
                }
                Err(e) => {
                    error!("Consumer for '{queue}' failed: {e}");
                    break;
                }
            }
        }

        warn!("Consumer for '{queue}' stopped after {handled} deliveries");
        handled
    }
}
