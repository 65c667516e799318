//! Emitter contract shared by every event stream

use crate::typestream::event::error::EventStreamError;
use crate::typestream::event::topic_event::{EventData, TopicEvent};
use async_trait::async_trait;

/// Anything events can be emitted into: the Kafka-backed emitter, the
/// in-memory stream, or test doubles.
#[async_trait]
pub trait EventStreamEmitter: Send + Sync {
    async fn emit(&self, event: TopicEvent<EventData>) -> Result<(), EventStreamError>;
}
