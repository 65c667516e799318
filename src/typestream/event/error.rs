//! Event stream error types

use crate::typestream::schema::SchemaError;
use std::error::Error;
use std::fmt;

/// Errors raised while dispatching, transforming, or serializing events.
#[derive(Debug)]
pub enum EventStreamError {
    /// A schema or registry operation failed
    Schema(SchemaError),
    /// A named schema could not be resolved when it was required
    MissingSchema(String),
    /// The writer schema of an event could not be resolved for delivery
    UnresolvedWriterSchema(String),
    /// No transform exists between a writer and reader schema that was
    /// required for delivery
    Transform(String),
    /// An event payload could not be serialized
    Serialization(String),
    /// No processors are registered for a topic that received a message
    NoProcessors(String),
    /// A message arrived without a payload
    NoContent(String),
    /// A processor failed while handling an event
    Processor(String),
}

impl fmt::Display for EventStreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStreamError::Schema(error) => write!(f, "Schema error: {}", error),
            EventStreamError::MissingSchema(name) => {
                write!(f, "Missing schema '{}' while serializing topic event", name)
            }
            EventStreamError::UnresolvedWriterSchema(name) => {
                write!(f, "Cannot resolve writer schema: {}", name)
            }
            EventStreamError::Transform(msg) => write!(f, "Schema transform failed: {}", msg),
            EventStreamError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            EventStreamError::NoProcessors(topic) => {
                write!(f, "No processors found for this topic: {}", topic)
            }
            EventStreamError::NoContent(topic) => {
                write!(f, "Topic message without content: {}", topic)
            }
            EventStreamError::Processor(msg) => write!(f, "Processor failed: {}", msg),
        }
    }
}

impl Error for EventStreamError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EventStreamError::Schema(error) => Some(error),
            _ => None,
        }
    }
}

impl From<SchemaError> for EventStreamError {
    fn from(error: SchemaError) -> Self {
        EventStreamError::Schema(error)
    }
}
