//! Broker client abstraction.
//!
//! [`Broker`] is the seam between the relays and the message broker. Two
//! implementations ship with the crate:
//!
//! - [`AmqpBroker`]: RabbitMQ over AMQP 0-9-1 (lapin)
//! - [`MemoryBroker`]: in-process queues for tests and offline runs
//!
//! Every queue is durable and is declared before it is published to or
//! consumed from. Payloads are raw bytes with no envelope.

mod amqp;
mod memory;

pub use amqp::AmqpBroker;
pub use memory::MemoryBroker;

use crate::error::broker::BrokerError;

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Ordered deliveries for one queue.
pub type DeliveryStream = BoxStream<'static, Result<Delivery, BrokerError>>;

/// How outbound publishes obtain a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// One long-lived connection and channel shared by every publish.
    #[default]
    Pooled,
    /// Open, declare, publish and close for each message.
    PerMessage,
}

#[async_trait]
pub trait Broker: Send + Sync {
    /// Idempotently ensure a durable queue named `queue` exists.
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError>;

    /// Declare `queue` and enqueue `payload` on it.
    ///
    /// Returns once the broker accepted the frame; no publisher confirm is awaited.
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Declare `queue` and start consuming it.
    async fn subscribe(&self, queue: &str) -> Result<DeliveryStream, BrokerError>;
}

/// Acknowledges one specific delivery.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    async fn ack(&self) -> Result<(), BrokerError>;
}

/// A message handed out by a [`DeliveryStream`].
///
/// [`Delivery::ack`] takes `self`, so a delivery can be acknowledged at most once.
pub struct Delivery {
    queue: String,
    delivery_tag: u64,
    redelivered: bool,
    payload: Vec<u8>,
    acker: Box<dyn Acknowledge>,
}

impl Delivery {
    pub fn new(
        queue: String,
        delivery_tag: u64,
        redelivered: bool,
        payload: Vec<u8>,
        acker: Box<dyn Acknowledge>,
    ) -> Self {
        Self {
            queue,
            delivery_tag,
            redelivered,
            payload,
            acker,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    /// Set by the broker when this message was delivered before and not acked.
    pub fn redelivered(&self) -> bool {
        self.redelivered
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The payload as text; invalid UTF-8 is replaced rather than rejected.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    pub async fn ack(self) -> Result<(), BrokerError> {
        self.acker.ack().await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("queue", &self.queue)
            .field("delivery_tag", &self.delivery_tag)
            .field("redelivered", &self.redelivered)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
