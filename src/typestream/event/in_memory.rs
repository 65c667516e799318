//! Process-local pub/sub over the emitter contract
//!
//! Implements the same emit/consume contract as the network transport for
//! tests and intra-process wiring. Delivery is synchronous with `emit`:
//! every matching processor runs before `emit` returns, in registration
//! order, and processor failures propagate to the emitter.

use crate::typestream::event::emitter::EventStreamEmitter;
use crate::typestream::event::error::EventStreamError;
use crate::typestream::event::processor::EventStreamProcessor;
use crate::typestream::event::topic_event::{EventData, Topic, TopicEvent};
use crate::typestream::schema::{Schema, SchemaRef, SchemaRegistry};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

struct StreamEntry {
    topic: Option<Topic>,
    schema: Option<Arc<dyn Schema>>,
    processor: Arc<dyn EventStreamProcessor>,
}

/// Options for subscribing a processor to an [`InMemoryEventStream`].
#[derive(Default)]
pub struct SubscribeOptions {
    /// Only deliver events on this topic; absent means every topic
    pub topic: Option<Topic>,
    /// Reader schema for delivered events. Events written with a different
    /// schema are converted through `transform_to` on delivery.
    pub schema: Option<SchemaRef>,
}

/// In-process event stream with optional per-processor schema conversion.
pub struct InMemoryEventStream {
    registry: Option<Arc<dyn SchemaRegistry>>,
    entries: Mutex<Vec<Arc<StreamEntry>>>,
}

impl InMemoryEventStream {
    pub fn new() -> Self {
        InMemoryEventStream {
            registry: None,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// A stream that can resolve schema names through `registry`
    pub fn with_registry(registry: Arc<dyn SchemaRegistry>) -> Self {
        InMemoryEventStream {
            registry: Some(registry),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Register a processor. Entries fire in registration order.
    pub async fn add_processor(
        &self,
        processor: Arc<dyn EventStreamProcessor>,
        options: SubscribeOptions,
    ) -> Result<(), EventStreamError> {
        let schema = match options.schema {
            Some(schema_ref) => Some(self.resolve_schema(&schema_ref).await?),
            None => None,
        };
        self.entries
            .lock()
            .expect("stream entries lock poisoned")
            .push(Arc::new(StreamEntry {
                topic: options.topic,
                schema,
                processor,
            }));
        Ok(())
    }

    async fn resolve_schema(
        &self,
        schema_ref: &SchemaRef,
    ) -> Result<Arc<dyn Schema>, EventStreamError> {
        match schema_ref {
            SchemaRef::Value(schema) => Ok(Arc::clone(schema)),
            SchemaRef::Name(name) => {
                let registry = self.registry.as_ref().ok_or_else(|| {
                    EventStreamError::UnresolvedWriterSchema(format!(
                        "no registry to resolve schema: {}",
                        name
                    ))
                })?;
                registry
                    .get_schema(name)
                    .await?
                    .ok_or_else(|| EventStreamError::UnresolvedWriterSchema(name.to_string()))
            }
        }
    }

    async fn deliver(
        &self,
        entry: &StreamEntry,
        event: &TopicEvent<EventData>,
    ) -> Result<(), EventStreamError> {
        let data = match (&event.schema, &entry.schema) {
            (Some(writer_ref), Some(reader)) => {
                let writer = self.resolve_schema(writer_ref).await?;
                if writer.name() != reader.name() {
                    let transformer = writer.transform_to(reader.as_ref()).ok_or_else(|| {
                        EventStreamError::Transform(format!(
                            "no transform from '{}' to '{}'",
                            writer.name().unwrap_or("<unnamed>"),
                            reader.name().unwrap_or("<unnamed>"),
                        ))
                    })?;
                    let value = event.data.as_value().ok_or_else(|| {
                        EventStreamError::Serialization(
                            "schema-encoded event requires structured data".to_string(),
                        )
                    })?;
                    transformer
                        .deserialize(&writer.serialize(value)?)
                        .unwrap_or(Value::Null)
                } else {
                    passthrough(&event.data)
                }
            }
            _ => passthrough(&event.data),
        };
        entry
            .processor
            .process(TopicEvent {
                topic: event.topic.clone(),
                schema: event.schema.clone(),
                metadata: event.metadata.clone(),
                data,
            })
            .await
    }
}

impl Default for InMemoryEventStream {
    fn default() -> Self {
        Self::new()
    }
}

fn passthrough(data: &EventData) -> Value {
    match data {
        EventData::Value(value) => value.clone(),
        EventData::Text(text) => Value::from(text.as_str()),
        EventData::Bytes(bytes) => Value::from(String::from_utf8_lossy(bytes).into_owned()),
    }
}

#[async_trait]
impl EventStreamEmitter for InMemoryEventStream {
    async fn emit(&self, event: TopicEvent<EventData>) -> Result<(), EventStreamError> {
        let entries: Vec<Arc<StreamEntry>> = self
            .entries
            .lock()
            .expect("stream entries lock poisoned")
            .clone();
        for entry in entries {
            let topic_matches = match &entry.topic {
                Some(topic) => *topic == event.topic,
                None => true,
            };
            if topic_matches {
                self.deliver(&entry, &event).await?;
            }
        }
        Ok(())
    }
}
