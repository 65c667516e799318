//! Transport contracts the state machines drive
//!
//! The consumer and producer state machines are written against these
//! traits rather than a concrete broker client, so the rdkafka-backed
//! implementations in [`client`](crate::typestream::kafka::client) can be
//! swapped for in-process doubles in tests.

use crate::typestream::event::Topic;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Wire header names carried on every schema-encoded message
pub const SCHEMA_HEADER: &str = "schema";
pub const CORRELATION_ID_HEADER: &str = "correlationId";

/// Transport failures, split into the connection class (the peer is gone,
/// reconnect before retrying) and everything else (retry in place).
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    Connection(String),
    Other(String),
}

impl TransportError {
    pub fn is_connection(&self) -> bool {
        matches!(self, TransportError::Connection(_))
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connection(msg) => write!(f, "Transport connection error: {}", msg),
            TransportError::Other(msg) => write!(f, "Transport error: {}", msg),
        }
    }
}

impl Error for TransportError {}

/// Headers of an inbound wire message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireHeaders {
    pub schema: Option<Vec<u8>>,
    pub correlation_id: Option<Vec<u8>>,
}

/// An inbound message as delivered by the broker
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireMessage {
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub headers: WireHeaders,
}

/// Headers attached to an outbound record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireRecordHeaders {
    pub schema: Option<String>,
    pub correlation_id: Option<String>,
}

/// An outbound record: serialized payload plus routing metadata
#[derive(Debug, Clone, PartialEq)]
pub struct WireRecord {
    pub key: Option<String>,
    pub headers: WireRecordHeaders,
    pub value: Vec<u8>,
}

/// All records destined for one topic within a batch send
#[derive(Debug, Clone, PartialEq)]
pub struct TopicMessages {
    pub topic: Topic,
    pub messages: Vec<WireRecord>,
}

/// Per-message callback driven by [`ConsumerTransport::run`]
pub type MessageHandler =
    Arc<dyn Fn(Topic, WireMessage) -> BoxFuture<'static, Result<(), TransportError>> + Send + Sync>;

/// Consuming side of the broker client.
#[async_trait]
pub trait ConsumerTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Subscribe to the given topics. `from_beginning` requests the earliest
    /// available read position.
    async fn subscribe(&self, topics: &[Topic], from_beginning: bool)
        -> Result<(), TransportError>;

    /// Drive the message loop, invoking `handler` once per inbound message.
    ///
    /// One message's handler completes before the next is delivered; this is
    /// the transport's backpressure point. Returns `Ok` when the
    /// subscription ends (disconnect), `Err` when the transport or a handler
    /// fails.
    async fn run(&self, handler: MessageHandler) -> Result<(), TransportError>;
}

/// Producing side of the broker client.
#[async_trait]
pub trait ProducerTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Send all topic groups as one batch. Within a topic, records are
    /// delivered in slice order.
    async fn send_batch(&self, batches: Vec<TopicMessages>) -> Result<(), TransportError>;
}
