//! Schema fixtures shared by the in-crate unit tests.

use crate::typestream::schema::error::SchemaError;
use crate::typestream::schema::types::{Schema, SchemaDeserializer, SchemaTypeSerializer};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// Fixed-width little-endian u32 schema; transforms into [`TextSchema`].
pub struct NumberSchema {
    name: String,
}

impl NumberSchema {
    pub fn new(name: impl Into<String>) -> Arc<dyn Schema> {
        Arc::new(NumberSchema { name: name.into() })
    }
}

impl Schema for NumberSchema {
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn validate(&self, value: &Value) -> bool {
        value.as_u64().is_some_and(|n| n <= u32::MAX as u64)
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, SchemaError> {
        let number = value
            .as_u64()
            .filter(|n| *n <= u32::MAX as u64)
            .ok_or_else(|| SchemaError::Serialization(format!("not a u32: {}", value)))?;
        Ok((number as u32).to_le_bytes().to_vec())
    }

    fn deserialize(&self, bytes: &[u8]) -> Option<Value> {
        let bytes: [u8; 4] = bytes.try_into().ok()?;
        Some(Value::from(u32::from_le_bytes(bytes)))
    }

    fn transform_to(&self, reader: &dyn Schema) -> Option<Box<dyn SchemaDeserializer>> {
        if reader.as_any().is::<TextSchema>() {
            Some(Box::new(NumberToText))
        } else {
            None
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct NumberToText;

impl SchemaDeserializer for NumberToText {
    fn deserialize(&self, bytes: &[u8]) -> Option<Value> {
        let bytes: [u8; 4] = bytes.try_into().ok()?;
        Some(Value::from(u32::from_le_bytes(bytes).to_string()))
    }
}

/// UTF-8 text schema; transforms into [`NumberSchema`].
pub struct TextSchema {
    name: String,
}

impl TextSchema {
    pub fn new(name: impl Into<String>) -> Arc<dyn Schema> {
        Arc::new(TextSchema { name: name.into() })
    }
}

impl Schema for TextSchema {
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn validate(&self, value: &Value) -> bool {
        value.is_string()
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, SchemaError> {
        let text = value
            .as_str()
            .ok_or_else(|| SchemaError::Serialization(format!("not a string: {}", value)))?;
        Ok(text.as_bytes().to_vec())
    }

    fn deserialize(&self, bytes: &[u8]) -> Option<Value> {
        std::str::from_utf8(bytes).ok().map(Value::from)
    }

    fn transform_to(&self, reader: &dyn Schema) -> Option<Box<dyn SchemaDeserializer>> {
        if reader.as_any().is::<NumberSchema>() {
            Some(Box::new(TextToNumber))
        } else {
            None
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct TextToNumber;

impl SchemaDeserializer for TextToNumber {
    fn deserialize(&self, bytes: &[u8]) -> Option<Value> {
        let text = std::str::from_utf8(bytes).ok()?;
        text.parse::<u32>().ok().map(Value::from)
    }
}

/// Serializer for the test schema families, persisting `<tag>:<name>`.
pub struct TestSchemaTypeSerializer {
    type_tag: String,
}

impl TestSchemaTypeSerializer {
    pub fn new(type_tag: impl Into<String>) -> Self {
        TestSchemaTypeSerializer {
            type_tag: type_tag.into(),
        }
    }
}

impl SchemaTypeSerializer for TestSchemaTypeSerializer {
    fn type_tag(&self) -> &str {
        &self.type_tag
    }

    fn to_bytes(&self, schema: &dyn Schema) -> Option<Vec<u8>> {
        let name = schema.name()?;
        if schema.as_any().is::<NumberSchema>() && self.type_tag == "number" {
            Some(format!("number:{}", name).into_bytes())
        } else if schema.as_any().is::<TextSchema>() && self.type_tag == "text" {
            Some(format!("text:{}", name).into_bytes())
        } else {
            None
        }
    }

    fn from_bytes(&self, bytes: &[u8]) -> Option<Arc<dyn Schema>> {
        let text = std::str::from_utf8(bytes).ok()?;
        let (tag, name) = text.split_once(':')?;
        if tag != self.type_tag {
            return None;
        }
        match tag {
            "number" => Some(NumberSchema::new(name)),
            "text" => Some(TextSchema::new(name)),
            _ => None,
        }
    }
}
