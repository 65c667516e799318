//! Avro-backed schema family
//!
//! Values cross the schema boundary as `serde_json::Value` and are converted
//! field by field against the Avro schema before encoding. Transformation
//! between Avro schemas uses Avro schema resolution, so reads tolerate
//! fields added with defaults on the reader side and fields removed from it.

use crate::typestream::schema::error::SchemaError;
use crate::typestream::schema::types::{Schema, SchemaDeserializer, SchemaTypeSerializer};
use apache_avro::schema_compatibility::SchemaCompatibility;
use apache_avro::types::Value as AvroValue;
use apache_avro::{from_avro_datum, to_avro_datum, Schema as AvroTypedSchema};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// A [`Schema`] backed by an Avro schema definition.
pub struct AvroSchema {
    name: String,
    schema: AvroTypedSchema,
}

impl AvroSchema {
    /// Parse an Avro schema from its JSON definition.
    pub fn parse(name: impl Into<String>, definition: &str) -> Result<Arc<dyn Schema>, SchemaError> {
        let schema = AvroTypedSchema::parse_str(definition)
            .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
        Ok(Arc::new(AvroSchema {
            name: name.into(),
            schema,
        }))
    }

    /// Wrap an already-parsed Avro schema.
    pub fn from_schema(name: impl Into<String>, schema: AvroTypedSchema) -> Arc<dyn Schema> {
        Arc::new(AvroSchema {
            name: name.into(),
            schema,
        })
    }

    pub fn avro_schema(&self) -> &AvroTypedSchema {
        &self.schema
    }
}

impl Schema for AvroSchema {
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn validate(&self, value: &Value) -> bool {
        json_to_avro(&self.schema, value).is_ok()
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, SchemaError> {
        // Raw Avro encoding, no object-container framing: wire payloads
        // carry the schema name in a header instead of embedding the schema.
        let avro_value = json_to_avro(&self.schema, value)?;
        to_avro_datum(&self.schema, avro_value)
            .map_err(|e| SchemaError::Serialization(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Option<Value> {
        let avro_value = from_avro_datum(&self.schema, &mut &bytes[..], None).ok()?;
        avro_to_json(&avro_value)
    }

    fn transform_to(&self, reader: &dyn Schema) -> Option<Box<dyn SchemaDeserializer>> {
        let reader = reader.as_any().downcast_ref::<AvroSchema>()?;
        if !SchemaCompatibility::can_read(&self.schema, &reader.schema) {
            return None;
        }
        Some(Box::new(AvroResolvingDeserializer {
            writer: self.schema.clone(),
            reader: reader.schema.clone(),
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Decodes bytes written with one Avro schema into values shaped by another,
/// using Avro schema resolution.
struct AvroResolvingDeserializer {
    writer: AvroTypedSchema,
    reader: AvroTypedSchema,
}

impl SchemaDeserializer for AvroResolvingDeserializer {
    fn deserialize(&self, bytes: &[u8]) -> Option<Value> {
        let avro_value = from_avro_datum(&self.writer, &mut &bytes[..], Some(&self.reader)).ok()?;
        avro_to_json(&avro_value)
    }
}

/// Convert a JSON value into an Avro value shaped by `schema`.
fn json_to_avro(schema: &AvroTypedSchema, value: &Value) -> Result<AvroValue, SchemaError> {
    let mismatch = || {
        SchemaError::Serialization(format!(
            "value {} does not fit Avro schema {:?}",
            value, schema
        ))
    };
    match schema {
        AvroTypedSchema::Null => match value {
            Value::Null => Ok(AvroValue::Null),
            _ => Err(mismatch()),
        },
        AvroTypedSchema::Boolean => value
            .as_bool()
            .map(AvroValue::Boolean)
            .ok_or_else(mismatch),
        AvroTypedSchema::Int => value
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(AvroValue::Int)
            .ok_or_else(mismatch),
        AvroTypedSchema::Long => value.as_i64().map(AvroValue::Long).ok_or_else(mismatch),
        AvroTypedSchema::Float => value
            .as_f64()
            .map(|n| AvroValue::Float(n as f32))
            .ok_or_else(mismatch),
        AvroTypedSchema::Double => value.as_f64().map(AvroValue::Double).ok_or_else(mismatch),
        AvroTypedSchema::String => value
            .as_str()
            .map(|s| AvroValue::String(s.to_string()))
            .ok_or_else(mismatch),
        AvroTypedSchema::Bytes => json_bytes(value).map(AvroValue::Bytes).ok_or_else(mismatch),
        AvroTypedSchema::Fixed(fixed) => {
            let bytes = json_bytes(value).ok_or_else(mismatch)?;
            if bytes.len() != fixed.size {
                return Err(mismatch());
            }
            Ok(AvroValue::Fixed(fixed.size, bytes))
        }
        AvroTypedSchema::Enum(symbols) => {
            let symbol = value.as_str().ok_or_else(mismatch)?;
            let position = symbols
                .symbols
                .iter()
                .position(|s| s == symbol)
                .ok_or_else(mismatch)?;
            Ok(AvroValue::Enum(position as u32, symbol.to_string()))
        }
        AvroTypedSchema::Array(items) => {
            let values = value.as_array().ok_or_else(mismatch)?;
            let converted = values
                .iter()
                .map(|item| json_to_avro(items, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AvroValue::Array(converted))
        }
        AvroTypedSchema::Map(values_schema) => {
            let object = value.as_object().ok_or_else(mismatch)?;
            let converted = object
                .iter()
                .map(|(key, item)| Ok((key.clone(), json_to_avro(values_schema, item)?)))
                .collect::<Result<std::collections::HashMap<_, _>, SchemaError>>()?;
            Ok(AvroValue::Map(converted))
        }
        AvroTypedSchema::Union(union) => {
            for (position, variant) in union.variants().iter().enumerate() {
                if let Ok(converted) = json_to_avro(variant, value) {
                    return Ok(AvroValue::Union(position as u32, Box::new(converted)));
                }
            }
            Err(mismatch())
        }
        AvroTypedSchema::Record(record) => {
            let object = value.as_object().ok_or_else(mismatch)?;
            let mut fields = Vec::with_capacity(record.fields.len());
            for field in &record.fields {
                let field_value = match object.get(&field.name) {
                    Some(present) => json_to_avro(&field.schema, present)?,
                    None => match &field.default {
                        Some(default) => json_to_avro(&field.schema, default)?,
                        None => {
                            return Err(SchemaError::Serialization(format!(
                                "missing field '{}' for Avro record",
                                field.name
                            )))
                        }
                    },
                };
                fields.push((field.name.clone(), field_value));
            }
            Ok(AvroValue::Record(fields))
        }
        _ => Err(SchemaError::Serialization(format!(
            "unsupported Avro schema: {:?}",
            schema
        ))),
    }
}

fn json_bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::String(s) => Some(s.as_bytes().to_vec()),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_u64().and_then(|n| u8::try_from(n).ok()))
            .collect(),
        _ => None,
    }
}

/// Convert a decoded Avro value back into JSON.
fn avro_to_json(value: &AvroValue) -> Option<Value> {
    match value {
        AvroValue::Null => Some(Value::Null),
        AvroValue::Boolean(b) => Some(Value::from(*b)),
        AvroValue::Int(n) => Some(Value::from(*n)),
        AvroValue::Long(n) => Some(Value::from(*n)),
        AvroValue::Float(n) => serde_json::Number::from_f64(*n as f64).map(Value::Number),
        AvroValue::Double(n) => serde_json::Number::from_f64(*n).map(Value::Number),
        AvroValue::String(s) => Some(Value::from(s.as_str())),
        AvroValue::Bytes(bytes) | AvroValue::Fixed(_, bytes) => {
            Some(Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()))
        }
        AvroValue::Enum(_, symbol) => Some(Value::from(symbol.as_str())),
        AvroValue::Union(_, inner) => avro_to_json(inner),
        AvroValue::Array(items) => items
            .iter()
            .map(avro_to_json)
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        AvroValue::Map(entries) => entries
            .iter()
            .map(|(key, item)| avro_to_json(item).map(|v| (key.clone(), v)))
            .collect::<Option<serde_json::Map<_, _>>>()
            .map(Value::Object),
        AvroValue::Record(fields) => fields
            .iter()
            .map(|(name, item)| avro_to_json(item).map(|v| (name.clone(), v)))
            .collect::<Option<serde_json::Map<_, _>>>()
            .map(Value::Object),
        _ => None,
    }
}

/// Persists Avro schemas as a `{ "name", "type" }` JSON envelope under the
/// `"avro"` type tag.
pub struct AvroSchemaTypeSerializer;

impl SchemaTypeSerializer for AvroSchemaTypeSerializer {
    fn type_tag(&self) -> &str {
        "avro"
    }

    fn to_bytes(&self, schema: &dyn Schema) -> Option<Vec<u8>> {
        let avro = schema.as_any().downcast_ref::<AvroSchema>()?;
        let definition: Value = serde_json::from_str(&avro.schema.canonical_form()).ok()?;
        let envelope = serde_json::json!({
            "name": avro.name,
            "type": definition,
        });
        serde_json::to_vec(&envelope).ok()
    }

    fn from_bytes(&self, bytes: &[u8]) -> Option<Arc<dyn Schema>> {
        let envelope: Value = serde_json::from_slice(bytes).ok()?;
        let name = envelope.get("name")?.as_str()?;
        let definition = envelope.get("type")?;
        AvroSchema::parse(name, &definition.to_string()).ok()
    }
}
