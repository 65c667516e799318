//! JSON Schema-backed schema family
//!
//! Payloads are plain JSON bytes validated against a compiled JSON Schema.
//! This family performs no cross-schema conversion: readers either accept
//! the writer's name outright or the transform is refused.

use crate::typestream::schema::error::SchemaError;
use crate::typestream::schema::types::{Schema, SchemaDeserializer, SchemaTypeSerializer};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// A [`Schema`] backed by a JSON Schema definition.
pub struct JsonSchema {
    name: String,
    definition: Value,
    validator: JSONSchema,
}

impl JsonSchema {
    /// Compile a JSON Schema definition.
    pub fn from_value(
        name: impl Into<String>,
        definition: Value,
    ) -> Result<Arc<dyn Schema>, SchemaError> {
        let validator = JSONSchema::compile(&definition)
            .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
        Ok(Arc::new(JsonSchema {
            name: name.into(),
            definition,
            validator,
        }))
    }

    pub fn definition(&self) -> &Value {
        &self.definition
    }
}

impl Schema for JsonSchema {
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn validate(&self, value: &Value) -> bool {
        self.validator.is_valid(value)
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, SchemaError> {
        serde_json::to_vec(value).map_err(|e| SchemaError::Serialization(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Option<Value> {
        let value: Value = serde_json::from_slice(bytes).ok()?;
        if self.validate(&value) {
            Some(value)
        } else {
            None
        }
    }

    fn transform_to(&self, _reader: &dyn Schema) -> Option<Box<dyn SchemaDeserializer>> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Persists JSON schemas as a `{ "name", "type" }` JSON envelope under the
/// `"json"` type tag.
pub struct JsonSchemaTypeSerializer;

impl SchemaTypeSerializer for JsonSchemaTypeSerializer {
    fn type_tag(&self) -> &str {
        "json"
    }

    fn to_bytes(&self, schema: &dyn Schema) -> Option<Vec<u8>> {
        let json = schema.as_any().downcast_ref::<JsonSchema>()?;
        let envelope = serde_json::json!({
            "name": json.name,
            "type": json.definition,
        });
        serde_json::to_vec(&envelope).ok()
    }

    fn from_bytes(&self, bytes: &[u8]) -> Option<Arc<dyn Schema>> {
        let envelope: Value = serde_json::from_slice(bytes).ok()?;
        let name = envelope.get("name")?.as_str()?;
        let definition = envelope.get("type")?.clone();
        JsonSchema::from_value(name, definition).ok()
    }
}
