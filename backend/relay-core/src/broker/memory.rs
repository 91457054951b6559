//! In-process broker.
//!
//! Stands in for RabbitMQ when no broker is available: offline runs of the
//! overlay and the relay test suites. Queues are unbounded channels, every
//! publish and ack is recorded for inspection, and reachability, ack failures
//! and incompatible pre-existing queues can be simulated.
//!
//! A failed ack behaves like a closed AMQP channel: the message is requeued
//! flagged as redelivered, the consuming stream ends and the queue accepts a
//! new subscriber.

use crate::broker::{Acknowledge, Broker, Delivery, DeliveryStream};
use crate::error::broker::BrokerError;

use common::ErrorLocation;

use std::collections::HashMap;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use log::debug;
use tokio::sync::{Mutex, mpsc};

struct MemoryMessage {
    delivery_tag: u64,
    redelivered: bool,
    payload: Vec<u8>,
}

struct MemoryQueue {
    durable: bool,
    declarations: usize,
    next_tag: u64,
    sender: mpsc::UnboundedSender<MemoryMessage>,
    receiver: Option<mpsc::UnboundedReceiver<MemoryMessage>>,
    published: Vec<Vec<u8>>,
    acked: Vec<u64>,
}

impl MemoryQueue {
    fn new(durable: bool) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            durable,
            declarations: 0,
            next_tag: 1,
            sender,
            receiver: Some(receiver),
            published: Vec::new(),
            acked: Vec::new(),
        }
    }

    fn enqueue(&mut self, payload: Vec<u8>, redelivered: bool) {
        let delivery_tag = self.next_tag;
        self.next_tag += 1;

        if self
            .sender
            .send(MemoryMessage {
                delivery_tag,
                redelivered,
                payload,
            })
            .is_err()
        {
            debug!("Memory queue consumer is gone, message {delivery_tag} dropped");
        }
    }
}

#[derive(Default)]
struct MemoryState {
    queues: HashMap<String, MemoryQueue>,
}

/// Broker living entirely inside the process.
///
/// This type is `Clone`; all clones share the same queues.
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<MemoryState>>,
    reachable: Arc<AtomicBool>,
    failing_acks: Arc<AtomicUsize>,
    operations: Arc<AtomicUsize>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            reachable: Arc::new(AtomicBool::new(true)),
            failing_acks: Arc::new(AtomicUsize::new(0)),
            operations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A broker whose every operation fails with [`BrokerError::Connection`].
    pub fn unreachable() -> Self {
        let broker = Self::new();
        broker.set_reachable(false);
        broker
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Make the next `count` acks fail with [`BrokerError::Ack`].
    ///
    /// Each failure requeues the message as redelivered and ends the stream
    /// that handed it out.
    pub fn fail_next_acks(&self, count: usize) {
        self.failing_acks.store(count, Ordering::SeqCst);
    }

    fn take_ack_failure(&self) -> bool {
        self.failing_acks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Hand a consumer's receiver back so the queue can be subscribed again.
    async fn release(&self, queue: &str, receiver: mpsc::UnboundedReceiver<MemoryMessage>) {
        let mut state = self.state.lock().await;
        if let Some(q) = state.queues.get_mut(queue) {
            q.receiver = Some(receiver);
        }
        debug!("Memory queue '{queue}' released by its consumer");
    }

    /// Wait until `queue` has at least `count` acks, up to `timeout`.
    pub async fn wait_for_acks(&self, queue: &str, count: usize, timeout: Duration) -> Vec<u64> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let acked = self.acked(queue).await;
            if acked.len() >= count || tokio::time::Instant::now() >= deadline {
                return acked;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Pre-create a non-durable queue so a durable declaration conflicts with it.
    pub async fn with_transient_queue(self, queue: &str) -> Self {
        self.state
            .lock()
            .await
            .queues
            .insert(queue.to_string(), MemoryQueue::new(false));
        self
    }

    /// Put a message back on `queue` flagged as redelivered.
    pub async fn redeliver(&self, queue: &str, payload: &[u8]) {
        let mut state = self.state.lock().await;
        state
            .queues
            .entry(queue.to_string())
            .or_insert_with(|| MemoryQueue::new(true))
            .enqueue(payload.to_vec(), true);
    }

    /// Payloads published on `queue`, decoded as text, oldest first.
    pub async fn published(&self, queue: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .queues
            .get(queue)
            .map(|q| {
                q.published
                    .iter()
                    .map(|payload| String::from_utf8_lossy(payload).into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Delivery tags acknowledged on `queue`, in ack order.
    pub async fn acked(&self, queue: &str) -> Vec<u64> {
        let state = self.state.lock().await;
        state
            .queues
            .get(queue)
            .map(|q| q.acked.clone())
            .unwrap_or_default()
    }

    /// How many successful declarations `queue` has received.
    pub async fn declarations(&self, queue: &str) -> usize {
        let state = self.state.lock().await;
        state.queues.get(queue).map_or(0, |q| q.declarations)
    }

    pub async fn queue_count(&self) -> usize {
        self.state.lock().await.queues.len()
    }

    /// Total declare/publish/subscribe calls made, successful or not.
    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    #[track_caller]
    fn check_reachable(&self) -> Result<(), BrokerError> {
        self.operations.fetch_add(1, Ordering::SeqCst);

        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrokerError::Connection {
                message: String::from("memory broker is unreachable"),
                location: ErrorLocation::from(Location::caller()),
            })
        }
    }

    fn declare_in(state: &mut MemoryState, queue: &str) -> Result<(), BrokerError> {
        let entry = state
            .queues
            .entry(queue.to_string())
            .or_insert_with(|| MemoryQueue::new(true));

        if !entry.durable {
            return Err(BrokerError::declaration(
                queue,
                "PRECONDITION_FAILED - inequivalent arg 'durable'",
            ));
        }

        entry.declarations += 1;
        Ok(())
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError> {
        self.check_reachable()?;
        let mut state = self.state.lock().await;
        Self::declare_in(&mut state, queue)
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.check_reachable()?;
        let mut state = self.state.lock().await;
        Self::declare_in(&mut state, queue)?;

        if let Some(target) = state.queues.get_mut(queue) {
            target.published.push(payload.to_vec());
            target.enqueue(payload.to_vec(), false);
        }
        Ok(())
    }

    async fn subscribe(&self, queue: &str) -> Result<DeliveryStream, BrokerError> {
        self.check_reachable()?;
        let mut state = self.state.lock().await;
        Self::declare_in(&mut state, queue)?;

        let receiver = state
            .queues
            .get_mut(queue)
            .and_then(|q| q.receiver.take())
            .ok_or_else(|| BrokerError::consume(queue, "queue already has a consumer"))?;

        let queue_name = queue.to_string();
        let broker = self.clone();
        let closed = Arc::new(AtomicBool::new(false));

        let consumer = (receiver, broker.clone(), queue_name.clone(), Arc::clone(&closed));
        drop(state);

        let deliveries = stream::unfold(consumer, |(mut receiver, broker, queue, closed)| async move {
            if closed.load(Ordering::SeqCst) {
                broker.release(&queue, receiver).await;
                return None;
            }
            let message = receiver.recv().await?;
            Some((message, (receiver, broker, queue, closed)))
        })
        .map(move |message| {
            let acker = MemoryAcker {
                broker: broker.clone(),
                queue: queue_name.clone(),
                delivery_tag: message.delivery_tag,
                payload: message.payload.clone(),
                closed: Arc::clone(&closed),
            };
            Ok::<_, BrokerError>(Delivery::new(
                queue_name.clone(),
                message.delivery_tag,
                message.redelivered,
                message.payload,
                Box::new(acker),
            ))
        });

        Ok(deliveries.boxed())
    }
}

struct MemoryAcker {
    broker: MemoryBroker,
    queue: String,
    delivery_tag: u64,
    payload: Vec<u8>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Acknowledge for MemoryAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        let mut state = self.broker.state.lock().await;

        if self.broker.take_ack_failure() {
            self.closed.store(true, Ordering::SeqCst);
            if let Some(queue) = state.queues.get_mut(&self.queue) {
                queue.enqueue(self.payload.clone(), true);
            }
            return Err(BrokerError::Ack {
                queue: self.queue.clone(),
                delivery_tag: self.delivery_tag,
                message: String::from("channel closed before ack"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if let Some(queue) = state.queues.get_mut(&self.queue) {
            queue.acked.push(self.delivery_tag);
        }
        Ok(())
    }
}
