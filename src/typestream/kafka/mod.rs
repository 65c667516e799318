//! Kafka transport state machines
//!
//! [`KafkaEventStreamConsumer`] and [`KafkaEventStreamEmitter`] manage the
//! connection lifecycle against a broker: backoff retries, batching, and
//! error classification. Both are written against the transport contracts
//! in [`transport`]; [`client`] provides the rdkafka-backed
//! implementations.

pub mod client;
pub mod config;
pub mod consumer;
pub mod producer;
pub mod transport;

mod callback;

pub use client::{KafkaConsumerTransport, KafkaProducerTransport};
pub use config::{CommonKafkaConfig, KafkaConsumerConfig, KafkaProducerConfig};
pub use consumer::{
    ConsumerState, ErrorDisposition, EventStreamTopicProcessor, KafkaEventStreamConsumer,
    OnErrorHandler, ProcessingErrorKind,
};
pub use producer::{DisableOptions, EnableOptions, KafkaEventStreamEmitter, ProducerState};
pub use transport::{
    ConsumerTransport, MessageHandler, ProducerTransport, TopicMessages, TransportError,
    WireHeaders, WireMessage, WireRecord, WireRecordHeaders, CORRELATION_ID_HEADER, SCHEMA_HEADER,
};
