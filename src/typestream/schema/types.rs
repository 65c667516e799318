//! Core schema abstractions
//!
//! A [`Schema`] is a named, versioned contract for one data type: it
//! validates, serializes, and deserializes values, and knows how to produce
//! a converting deserializer into other schemas of its own family.
//!
//! Values cross schema boundaries as `serde_json::Value`; typed producers
//! and consumers convert at the edges with serde.

use crate::typestream::schema::error::SchemaError;
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A schema name, optionally carrying a version as `"<name>:<version>"`.
///
/// Two schemas are the same schema if and only if their names are equal;
/// the version suffix is what `SchemaMatching::Similar` ignores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaName(String);

impl SchemaName {
    pub fn new(name: impl Into<String>) -> Self {
        SchemaName(name.into())
    }

    /// Build a versioned schema name, rendered as `"<name>:<version>"`
    pub fn with_version(name: &str, version: &str) -> Self {
        SchemaName(format!("{}:{}", name, version))
    }

    /// Split into `(base, version)` on the first `:`
    pub fn unpack(&self) -> (&str, Option<&str>) {
        match self.0.split_once(':') {
            Some((base, version)) => (base, Some(version)),
            None => (self.0.as_str(), None),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SchemaName {
    fn from(name: &str) -> Self {
        SchemaName(name.to_string())
    }
}

impl From<String> for SchemaName {
    fn from(name: String) -> Self {
        SchemaName(name)
    }
}

/// A named contract for validating, serializing, and deserializing one data
/// type.
///
/// Implementations are immutable once built and are shared behind `Arc`;
/// registries never mutate a schema they return.
pub trait Schema: Send + Sync {
    /// Unique name of this schema and version, if it has one
    fn name(&self) -> Option<&str>;

    /// Whether a value is acceptable to this schema
    fn validate(&self, value: &Value) -> bool;

    /// Encode a value into this schema's wire representation
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, SchemaError>;

    /// Decode wire bytes, or `None` when the bytes do not fit this schema
    fn deserialize(&self, bytes: &[u8]) -> Option<Value>;

    /// Build a deserializer that reads bytes written with `self` and yields
    /// values shaped by `reader`.
    ///
    /// A schema only knows how to transform into schemas of its own family;
    /// unsupported pairs return `None` rather than failing.
    fn transform_to(&self, reader: &dyn Schema) -> Option<Box<dyn SchemaDeserializer>>;

    /// Downcast support for the family capability check in `transform_to`
    fn as_any(&self) -> &dyn Any;
}

/// Schema identity is by name: two schemas are equal exactly when their
/// names are (see [`SchemaName`]). Lets schemas and registry results be
/// compared and debug-printed through the `dyn Schema` trait object.
impl PartialEq for dyn Schema {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl fmt::Debug for dyn Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema").field("name", &self.name()).finish()
    }
}

/// The narrow read-side capability of a schema: decoding writer bytes into
/// reader-shaped values. Produced by [`Schema::transform_to`].
pub trait SchemaDeserializer: Send + Sync {
    fn deserialize(&self, bytes: &[u8]) -> Option<Value>;
}

/// A schema referenced either by name (resolved through a registry) or by
/// value.
#[derive(Clone)]
pub enum SchemaRef {
    Name(SchemaName),
    Value(Arc<dyn Schema>),
}

impl SchemaRef {
    /// The schema name this reference carries, if any
    pub fn name(&self) -> Option<&str> {
        match self {
            SchemaRef::Name(name) => Some(name.as_str()),
            SchemaRef::Value(schema) => schema.name(),
        }
    }
}

impl fmt::Debug for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaRef::Name(name) => f.debug_tuple("Name").field(name).finish(),
            SchemaRef::Value(schema) => f.debug_tuple("Value").field(&schema.name()).finish(),
        }
    }
}

impl From<SchemaName> for SchemaRef {
    fn from(name: SchemaName) -> Self {
        SchemaRef::Name(name)
    }
}

impl From<&str> for SchemaRef {
    fn from(name: &str) -> Self {
        SchemaRef::Name(SchemaName::from(name))
    }
}

impl From<Arc<dyn Schema>> for SchemaRef {
    fn from(schema: Arc<dyn Schema>) -> Self {
        SchemaRef::Value(schema)
    }
}

/// Lookup of schemas by name.
///
/// Implementations return `Ok(None)` for unknown names and reserve errors
/// for infrastructure failures (store unreachable, decoder missing).
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    async fn get_schema(&self, name: &SchemaName) -> Result<Option<Arc<dyn Schema>>, SchemaError>;
}

/// Converts one schema family to and from persistable bytes.
///
/// Each serializer owns a single `type_tag` identifying its family in the
/// persistent store.
pub trait SchemaTypeSerializer: Send + Sync {
    fn type_tag(&self) -> &str;

    /// Encode a schema, or `None` when the schema is not of this family
    fn to_bytes(&self, schema: &dyn Schema) -> Option<Vec<u8>>;

    /// Decode a schema, or `None` when the bytes are not a valid encoding
    fn from_bytes(&self, bytes: &[u8]) -> Option<Arc<dyn Schema>>;
}
