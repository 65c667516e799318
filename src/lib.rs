//! # typestream
//!
//! A schema-aware event streaming layer: moves typed, versioned events
//! between producers and consumers over a topic-based transport, using a
//! pluggable schema registry to validate, serialize, and transparently
//! convert between writer and reader schema versions.
//!
//! ## Features
//!
//! - **Typed, versioned events**: [`TopicEvent`] with branded topic, key,
//!   and correlation identifiers
//! - **Pluggable schema registries**: in-memory, persistent-store-backed,
//!   and a caching wrapper with single-flight concurrent fetches
//! - **Writer/reader compatibility resolution**: `exact`, `similar`, and
//!   `any` matching policies with schema-family transforms (Avro, JSON
//!   Schema)
//! - **Kafka transport state machines**: connection lifecycle, backoff
//!   retries, batching, and error classification on both the consumer and
//!   producer side, built on `rdkafka` and `tokio`
//! - **In-memory stream**: the same emit/consume contract without a broker,
//!   for tests and intra-process wiring
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use typestream::{
//!     AvroSchema, EventData, EventStreamEmitter, InMemorySchemaRegistry,
//!     KafkaEventStreamEmitter, KafkaProducerConfig, TopicEvent,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(InMemorySchemaRegistry::new());
//!     let user_schema = AvroSchema::parse(
//!         "user:1",
//!         r#"{
//!             "type": "record",
//!             "name": "User",
//!             "fields": [
//!                 {"name": "id", "type": "long"},
//!                 {"name": "email", "type": "string"}
//!             ]
//!         }"#,
//!     )?;
//!     registry.add(user_schema, None)?;
//!
//!     let emitter = KafkaEventStreamEmitter::with_config(
//!         KafkaProducerConfig::new("localhost:9092").client_id("my-service"),
//!         registry,
//!     );
//!
//!     emitter
//!         .emit(
//!             TopicEvent::new("users", EventData::from(json!({"id": 1, "email": "a@b.c"})))
//!                 .with_schema("user:1")
//!                 .with_key("user-1"),
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod typestream;

// Re-export the main API at the crate root for easy access
pub use typestream::event::{
    process_topic_event, CorrelationId, EventData, EventMetadata, EventStreamEmitter,
    EventStreamError, EventStreamProcessor, EventStreamProcessorConfig, InMemoryEventStream,
    SubscribeOptions, Topic, TopicEvent, TopicKey,
};
pub use typestream::kafka::{
    ConsumerState, ConsumerTransport, DisableOptions, EnableOptions, ErrorDisposition,
    EventStreamTopicProcessor, KafkaConsumerConfig, KafkaConsumerTransport,
    KafkaEventStreamConsumer, KafkaEventStreamEmitter, KafkaProducerConfig,
    KafkaProducerTransport, MessageHandler, OnErrorHandler, ProcessingErrorKind, ProducerState,
    ProducerTransport, TopicMessages, TransportError, WireHeaders, WireMessage, WireRecord,
    WireRecordHeaders,
};
pub use typestream::schema::{
    schema_deserializer, AvroSchema, AvroSchemaTypeSerializer, CacheReport, CachedRegistryOptions,
    CachedSchemaRegistry, FailedSchema, InMemorySchemaRegistry, InMemorySchemaStore, JsonSchema,
    JsonSchemaTypeSerializer, PersistentSchemaRegistry, PersistentSchemaStore, Schema,
    SchemaDeserializer, SchemaError, SchemaMatching, SchemaName, SchemaRef, SchemaRegistry,
    SchemaTypeSerializer, StoredSchema,
};
