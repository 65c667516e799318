//! Schema and registry error types

use std::error::Error;
use std::fmt;

/// Errors raised by schema operations and registries.
///
/// `Clone` is required because registry results are fanned out to every
/// waiter of a shared in-flight fetch (see `CachedSchemaRegistry`).
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// A schema was registered without a name and none was supplied
    MissingSchemaName,
    /// No serializer is registered for a schema (or a persisted type tag)
    MissingSchemaSerializer {
        schema: String,
        type_tag: Option<String>,
    },
    /// A schema definition could not be parsed or compiled
    InvalidSchema(String),
    /// A value could not be encoded with a schema
    Serialization(String),
    /// The persistent schema store failed
    Store(String),
    /// A registry lookup failed
    Registry(String),
}

impl SchemaError {
    pub fn missing_serializer(schema: impl Into<String>) -> Self {
        SchemaError::MissingSchemaSerializer {
            schema: schema.into(),
            type_tag: None,
        }
    }

    pub fn missing_serializer_for_type(
        schema: impl Into<String>,
        type_tag: impl Into<String>,
    ) -> Self {
        SchemaError::MissingSchemaSerializer {
            schema: schema.into(),
            type_tag: Some(type_tag.into()),
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::MissingSchemaName => write!(f, "Missing schema name"),
            SchemaError::MissingSchemaSerializer {
                schema,
                type_tag: Some(type_tag),
            } => write!(
                f,
                "Missing schema serializer for '{}' (type '{}')",
                schema, type_tag
            ),
            SchemaError::MissingSchemaSerializer { schema, .. } => {
                write!(f, "Missing schema serializer for '{}'", schema)
            }
            SchemaError::InvalidSchema(msg) => write!(f, "Invalid schema: {}", msg),
            SchemaError::Serialization(msg) => write!(f, "Schema serialization error: {}", msg),
            SchemaError::Store(msg) => write!(f, "Schema store error: {}", msg),
            SchemaError::Registry(msg) => write!(f, "Schema registry error: {}", msg),
        }
    }
}

impl Error for SchemaError {}
