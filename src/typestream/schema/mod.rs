//! Schema abstraction and registries
//!
//! A [`Schema`] is the contract for one data type: validation, wire
//! serialization, and conversion into other schema versions. Registries
//! resolve schemas by name:
//!
//! - [`InMemorySchemaRegistry`]: process-local map, for tests and static
//!   wiring
//! - [`PersistentSchemaRegistry`]: delegates byte storage to an external
//!   store through pluggable per-family serializers
//! - [`CachedSchemaRegistry`]: wraps any registry with a local cache and
//!   single-flight concurrent fetches
//!
//! [`schema_deserializer`] resolves writer/reader compatibility under a
//! [`SchemaMatching`] policy and is the entry point used by the event
//! dispatch pipeline.

pub mod avro;
pub mod cached;
pub mod deserializer;
pub mod error;
pub mod json;
pub mod persistent;
pub mod registry;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use avro::{AvroSchema, AvroSchemaTypeSerializer};
pub use cached::{CacheReport, CachedRegistryOptions, CachedSchemaRegistry, FailedSchema};
pub use deserializer::{schema_deserializer, SchemaMatching};
pub use error::SchemaError;
pub use json::{JsonSchema, JsonSchemaTypeSerializer};
pub use persistent::{
    InMemorySchemaStore, PersistentSchemaRegistry, PersistentSchemaStore, StoredSchema,
};
pub use registry::InMemorySchemaRegistry;
pub use types::{
    Schema, SchemaDeserializer, SchemaName, SchemaRef, SchemaRegistry, SchemaTypeSerializer,
};
