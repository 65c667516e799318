//! Topic events and their identifiers
//!
//! [`TopicEvent`] is the unit moved by every stream in this crate. Its
//! payload type changes with where the event is: [`EventData`] at the
//! producer edge, raw bytes on the wire, and `serde_json::Value` at the
//! processor edge.

use crate::typestream::schema::SchemaRef;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                $name(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                $name(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                $name(value)
            }
        }
    };
}

string_id! {
    /// Name of a stream topic
    Topic
}

string_id! {
    /// Partitioning key attached to an event
    TopicKey
}

string_id! {
    /// Identifier correlating an event to the request or flow it belongs to
    CorrelationId
}

/// Payload of an event at the producer edge.
///
/// Events without a schema may carry raw bytes or plain text; schema-encoded
/// events carry a structured [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    Bytes(Vec<u8>),
    Text(String),
    Value(Value),
}

impl EventData {
    /// The structured form of this payload, if it has one
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            EventData::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl From<Value> for EventData {
    fn from(value: Value) -> Self {
        EventData::Value(value)
    }
}

impl From<String> for EventData {
    fn from(text: String) -> Self {
        EventData::Text(text)
    }
}

impl From<&str> for EventData {
    fn from(text: &str) -> Self {
        EventData::Text(text.to_string())
    }
}

impl From<Vec<u8>> for EventData {
    fn from(bytes: Vec<u8>) -> Self {
        EventData::Bytes(bytes)
    }
}

/// Optional metadata carried alongside an event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventMetadata {
    pub key: Option<TopicKey>,
    pub correlation_id: Option<CorrelationId>,
}

impl EventMetadata {
    fn is_empty(&self) -> bool {
        self.key.is_none() && self.correlation_id.is_none()
    }
}

/// A typed, versioned event on a topic.
///
/// Immutable once built; use the `with_*` builders at construction time.
#[derive(Debug, Clone)]
pub struct TopicEvent<T> {
    pub topic: Topic,
    pub schema: Option<SchemaRef>,
    pub metadata: Option<EventMetadata>,
    pub data: T,
}

impl<T> TopicEvent<T> {
    pub fn new(topic: impl Into<Topic>, data: T) -> Self {
        TopicEvent {
            topic: topic.into(),
            schema: None,
            metadata: None,
            data,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<SchemaRef>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<TopicKey>) -> Self {
        let mut metadata = self.metadata.take().unwrap_or_default();
        metadata.key = Some(key.into());
        self.metadata = Some(metadata);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<CorrelationId>) -> Self {
        let mut metadata = self.metadata.take().unwrap_or_default();
        metadata.correlation_id = Some(correlation_id.into());
        self.metadata = Some(metadata);
        self
    }

    /// The key this event should be partitioned by, if any
    pub fn key(&self) -> Option<&TopicKey> {
        self.metadata.as_ref().and_then(|m| m.key.as_ref())
    }

    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.metadata.as_ref().and_then(|m| m.correlation_id.as_ref())
    }

    /// Replace the payload, keeping topic, schema, and metadata
    pub fn map_data<U>(self, data: U) -> TopicEvent<U> {
        TopicEvent {
            topic: self.topic,
            schema: self.schema,
            metadata: self.metadata,
            data,
        }
    }
}

impl TopicEvent<Value> {
    /// Decode the structured payload into a concrete type with serde
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

/// Build metadata from optional parts, collapsing to `None` when both are
/// absent.
pub(crate) fn metadata_from_parts(
    key: Option<TopicKey>,
    correlation_id: Option<CorrelationId>,
) -> Option<EventMetadata> {
    let metadata = EventMetadata {
        key,
        correlation_id,
    };
    if metadata.is_empty() {
        None
    } else {
        Some(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn builders_populate_metadata() {
        let event = TopicEvent::new("orders", EventData::from(json!({"id": 1})))
            .with_key("order-1")
            .with_correlation_id("req-7");

        assert_eq!(event.topic.as_str(), "orders");
        assert_eq!(event.key().map(TopicKey::as_str), Some("order-1"));
        assert_eq!(
            event.correlation_id().map(CorrelationId::as_str),
            Some("req-7")
        );
    }

    #[test]
    fn metadata_collapses_when_empty() {
        assert!(metadata_from_parts(None, None).is_none());
        assert!(metadata_from_parts(Some(TopicKey::from("k")), None).is_some());
    }

    #[test]
    fn decode_into_typed_struct() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Order {
            id: u64,
        }

        let event = TopicEvent::new("orders", json!({"id": 3}));
        assert_eq!(event.decode::<Order>().unwrap(), Order { id: 3 });
    }
}
