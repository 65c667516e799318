//! Topic events, processors, and the dispatch pipeline
//!
//! Producers build a [`TopicEvent`] and hand it to an
//! [`EventStreamEmitter`]; consumers register [`EventStreamProcessor`]s
//! bound to reader schemas, and [`process_topic_event`] fans raw wire
//! events out to every compatible processor.

pub mod emitter;
pub mod error;
pub mod in_memory;
pub mod processor;
pub mod topic_event;

pub use emitter::EventStreamEmitter;
pub use error::EventStreamError;
pub use in_memory::{InMemoryEventStream, SubscribeOptions};
pub use processor::{process_topic_event, EventStreamProcessor, EventStreamProcessorConfig};
pub use topic_event::{CorrelationId, EventData, EventMetadata, Topic, TopicEvent, TopicKey};
