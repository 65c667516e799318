//! Typed event processors and the dispatch pipeline

use crate::typestream::event::error::EventStreamError;
use crate::typestream::event::topic_event::TopicEvent;
use crate::typestream::schema::{
    schema_deserializer, Schema, SchemaMatching, SchemaRegistry,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Handler for typed events delivered by a stream.
#[async_trait]
pub trait EventStreamProcessor: Send + Sync {
    async fn process(&self, event: TopicEvent<Value>) -> Result<(), EventStreamError>;
}

/// Binds a reader schema and compatibility policy to a processor.
#[derive(Clone)]
pub struct EventStreamProcessorConfig {
    pub schema: Arc<dyn Schema>,
    pub matching: SchemaMatching,
    pub processor: Arc<dyn EventStreamProcessor>,
}

impl EventStreamProcessorConfig {
    pub fn new(
        schema: Arc<dyn Schema>,
        matching: SchemaMatching,
        processor: Arc<dyn EventStreamProcessor>,
    ) -> Self {
        EventStreamProcessorConfig {
            schema,
            matching,
            processor,
        }
    }
}

/// Fan a raw wire event out to every configured processor whose reader
/// schema is compatible with the event's writer schema.
///
/// Each config resolves its own deserializer; configs whose matching policy
/// rejects the writer schema are skipped silently. An event without a schema
/// is a no-op. All compatible processors run concurrently, and the first
/// failure (resolution or processing) propagates to the caller: the pipeline
/// does not isolate failures across configs, callers needing isolation wrap
/// each processor.
pub async fn process_topic_event(
    registry: &dyn SchemaRegistry,
    raw_event: &TopicEvent<Vec<u8>>,
    processors: &[EventStreamProcessorConfig],
) -> Result<(), EventStreamError> {
    let Some(writer_schema) = &raw_event.schema else {
        return Ok(());
    };
    futures::future::try_join_all(processors.iter().map(|config| async move {
        let deserializer =
            schema_deserializer(registry, writer_schema, config.matching, &config.schema).await?;
        if let Some(deserializer) = deserializer {
            let data = deserializer
                .deserialize(&raw_event.data)
                .unwrap_or(Value::Null);
            let event = TopicEvent {
                topic: raw_event.topic.clone(),
                schema: raw_event.schema.clone(),
                metadata: raw_event.metadata.clone(),
                data,
            };
            config.processor.process(event).await?;
        }
        Ok::<(), EventStreamError>(())
    }))
    .await
    .map(|_| ())
}
