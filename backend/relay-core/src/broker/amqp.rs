//! RabbitMQ broker client on top of lapin.
//!
//! Publishes go through either a pooled session (one connection + channel,
//! reopened on the next publish after any failure) or a fresh session per
//! message. Subscriptions share one long-lived connection, one channel each.

use crate::broker::{Acknowledge, Broker, ConnectionMode, Delivery, DeliveryStream};
use crate::error::broker::BrokerError;

use common::{ErrorLocation, RedactedUri};

use std::collections::HashSet;
use std::panic::Location;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use log::{debug, info, warn};
use tokio::sync::Mutex;
use uuid::Uuid;

/// AMQP `delivery_mode` for messages that survive a broker restart.
const PERSISTENT_DELIVERY_MODE: u8 = 2;

const CLOSE_REPLY_CODE: u16 = 200;
const CLOSE_REPLY_TEXT: &str = "OK";

const CONSUMER_TAG_PREFIX: &str = crate::APP_NAME;

/// Default exchange: routes by queue name.
const DEFAULT_EXCHANGE: &str = "";

enum PublisherOp<'a> {
    Declare,
    Publish(&'a [u8]),
}

/// A connection with one channel and the queues already declared on it.
struct Session {
    connection: Connection,
    channel: Channel,
    declared: HashSet<String>,
}

impl Session {
    async fn open(connection: Connection) -> Result<Self, BrokerError> {
        let channel = connection
            .create_channel()
            .await
            .map_err(BrokerError::connection)?;

        Ok(Self {
            connection,
            channel,
            declared: HashSet::new(),
        })
    }

    fn is_open(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    async fn execute(&mut self, queue: &str, op: PublisherOp<'_>) -> Result<(), BrokerError> {
        match op {
            PublisherOp::Declare => {
                declare(&self.channel, queue).await?;
                self.declared.insert(queue.to_string());
                Ok(())
            }
            PublisherOp::Publish(payload) => {
                if !self.declared.contains(queue) {
                    declare(&self.channel, queue).await?;
                    self.declared.insert(queue.to_string());
                }

                self.channel
                    .basic_publish(
                        DEFAULT_EXCHANGE,
                        queue,
                        BasicPublishOptions::default(),
                        payload,
                        BasicProperties::default().with_delivery_mode(PERSISTENT_DELIVERY_MODE),
                    )
                    .await
                    .map(|_confirm| ())
                    .map_err(|e| BrokerError::publish(queue, e))
            }
        }
    }

    async fn close(self) {
        if let Err(e) = self.channel.close(CLOSE_REPLY_CODE, CLOSE_REPLY_TEXT).await {
            debug!("Channel close failed: {e}");
        }
        if let Err(e) = self
            .connection
            .close(CLOSE_REPLY_CODE, CLOSE_REPLY_TEXT)
            .await
        {
            debug!("Connection close failed: {e}");
        }
    }
}

/// Broker client for RabbitMQ.
pub struct AmqpBroker {
    uri: RedactedUri,
    mode: ConnectionMode,
    publisher: Mutex<Option<Session>>,
    consumer_connection: Mutex<Option<Connection>>,
    connection_attempts: AtomicUsize,
}

impl AmqpBroker {
    /// Create a client without touching the network.
    ///
    /// Connections are opened on first use, so an unreachable broker only
    /// surfaces as errors from individual operations.
    pub fn new(uri: RedactedUri, mode: ConnectionMode) -> Self {
        Self {
            uri,
            mode,
            publisher: Mutex::new(None),
            consumer_connection: Mutex::new(None),
            connection_attempts: AtomicUsize::new(0),
        }
    }

    pub fn uri(&self) -> &RedactedUri {
        &self.uri
    }

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    /// Connections opened or attempted so far, for publishing and consuming.
    pub fn connection_attempts(&self) -> usize {
        self.connection_attempts.load(Ordering::SeqCst)
    }

    async fn open_connection(&self) -> Result<Connection, BrokerError> {
        self.connection_attempts.fetch_add(1, Ordering::SeqCst);
        debug!("Connecting to broker at {}", self.uri);

        Connection::connect(self.uri.expose(), ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::connection(format!("{}: {e}", self.uri)))
    }

    async fn open_session(&self) -> Result<Session, BrokerError> {
        Session::open(self.open_connection().await?).await
    }

    /// Close the pooled publisher and the subscription connection.
    pub async fn close(&self) {
        if let Some(session) = self.publisher.lock().await.take() {
            session.close().await;
        }
        if let Some(connection) = self.consumer_connection.lock().await.take() {
            if let Err(e) = connection.close(CLOSE_REPLY_CODE, CLOSE_REPLY_TEXT).await {
                debug!("Consumer connection close failed: {e}");
            }
        }
        info!("Broker connections closed");
    }

    async fn execute(&self, queue: &str, op: PublisherOp<'_>) -> Result<(), BrokerError> {
        match self.mode {
            ConnectionMode::PerMessage => {
                let mut session = self.open_session().await?;
                let result = session.execute(queue, op).await;
                session.close().await;
                result
            }
            ConnectionMode::Pooled => {
                let mut pooled = self.publisher.lock().await;

                let mut session = match pooled.take() {
                    Some(session) if session.is_open() => session,
                    Some(_) => {
                        debug!("Pooled publisher session closed, reopening");
                        self.open_session().await?
                    }
                    None => self.open_session().await?,
                };

                let result = session.execute(queue, op).await;
                if result.is_ok() {
                    *pooled = Some(session);
                } else {
                    warn!("Discarding pooled publisher session after failure on '{queue}'");
                }
                result
            }
        }
    }

    async fn consumer_channel(&self) -> Result<Channel, BrokerError> {
        let mut guard = self.consumer_connection.lock().await;

        let connection = match guard.take() {
            Some(connection) if connection.status().connected() => connection,
            _ => self.open_connection().await?,
        };

        let channel = connection.create_channel().await;
        *guard = Some(connection);
        channel.map_err(BrokerError::connection)
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError> {
        self.execute(queue, PublisherOp::Declare).await
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.execute(queue, PublisherOp::Publish(payload)).await
    }

    async fn subscribe(&self, queue: &str) -> Result<DeliveryStream, BrokerError> {
        let channel = self.consumer_channel().await?;
        declare(&channel, queue).await?;

        let consumer_tag = format!("{CONSUMER_TAG_PREFIX}-{}", Uuid::new_v4());
        let consumer = channel
            .basic_consume(
                queue,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::consume(queue, e))?;

        info!("Consuming '{queue}' as {consumer_tag}");

        let queue_name = queue.to_string();
        let stream = consumer.map(move |item| {
            // Keep the channel alive for as long as the stream is consumed.
            let _channel = &channel;

            match item {
                Ok(delivery) => {
                    let acker = AmqpAcker {
                        queue: queue_name.clone(),
                        delivery_tag: delivery.delivery_tag,
                        acker: delivery.acker,
                    };
                    Ok(Delivery::new(
                        queue_name.clone(),
                        delivery.delivery_tag,
                        delivery.redelivered,
                        delivery.data,
                        Box::new(acker),
                    ))
                }
                Err(e) => Err(BrokerError::consume(&queue_name, e)),
            }
        });

        Ok(stream.boxed())
    }
}

struct AmqpAcker {
    queue: String,
    delivery_tag: u64,
    acker: Acker,
}

#[async_trait]
impl Acknowledge for AmqpAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| BrokerError::Ack {
                queue: self.queue.clone(),
                delivery_tag: self.delivery_tag,
                message: e.to_string(),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

async fn declare(channel: &Channel, queue: &str) -> Result<(), BrokerError> {
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map(|_queue| {
            debug!("Queue declared: {queue}");
        })
        .map_err(|e| BrokerError::declaration(queue, e))
}
