//! Registry backed by an external persistent key-value store
//!
//! Schemas are flattened to bytes by pluggable per-family serializers and
//! stored base64-encoded under their name together with the family's type
//! tag. Every lookup re-reads the store; caching is layered separately by
//! [`CachedSchemaRegistry`](crate::typestream::schema::cached::CachedSchemaRegistry).

use crate::typestream::schema::error::SchemaError;
use crate::typestream::schema::types::{
    Schema, SchemaName, SchemaRegistry, SchemaTypeSerializer,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;

/// A persisted schema record: the family type tag plus base64 schema bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSchema {
    pub type_tag: String,
    pub schema: String,
}

/// External byte store for serialized schemas.
///
/// `save` may be best-effort no-overwrite; `load` returns `None` for
/// unknown names.
#[async_trait]
pub trait PersistentSchemaStore: Send + Sync {
    async fn save(
        &self,
        type_tag: &str,
        name: &SchemaName,
        schema: &str,
    ) -> Result<(), SchemaError>;

    async fn load(&self, name: &SchemaName) -> Result<Option<StoredSchema>, SchemaError>;
}

/// Process-local [`PersistentSchemaStore`] with first-write-wins semantics,
/// for wiring and tests.
pub struct InMemorySchemaStore {
    entries: std::sync::Mutex<std::collections::HashMap<String, StoredSchema>>,
}

impl InMemorySchemaStore {
    pub fn new() -> Self {
        InMemorySchemaStore {
            entries: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for InMemorySchemaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistentSchemaStore for InMemorySchemaStore {
    async fn save(
        &self,
        type_tag: &str,
        name: &SchemaName,
        schema: &str,
    ) -> Result<(), SchemaError> {
        self.entries
            .lock()
            .expect("schema store lock poisoned")
            .entry(name.as_str().to_string())
            .or_insert_with(|| StoredSchema {
                type_tag: type_tag.to_string(),
                schema: schema.to_string(),
            });
        Ok(())
    }

    async fn load(&self, name: &SchemaName) -> Result<Option<StoredSchema>, SchemaError> {
        Ok(self
            .entries
            .lock()
            .expect("schema store lock poisoned")
            .get(name.as_str())
            .cloned())
    }
}

/// Schema registry that delegates byte storage to a [`PersistentSchemaStore`].
///
/// Serializers are tried in registration order when persisting a schema;
/// the first one that can encode the schema wins and its type tag is stored
/// alongside the bytes.
pub struct PersistentSchemaRegistry {
    store: Arc<dyn PersistentSchemaStore>,
    serializers: Vec<Arc<dyn SchemaTypeSerializer>>,
}

impl PersistentSchemaRegistry {
    pub fn new(
        store: Arc<dyn PersistentSchemaStore>,
        serializers: Vec<Arc<dyn SchemaTypeSerializer>>,
    ) -> Self {
        PersistentSchemaRegistry { store, serializers }
    }

    pub fn add_schema_serializer(&mut self, serializer: Arc<dyn SchemaTypeSerializer>) {
        self.serializers.push(serializer);
    }

    /// Persist a schema through the first serializer that can encode it.
    ///
    /// Fails with [`SchemaError::MissingSchemaSerializer`] when no registered
    /// serializer matches, and with [`SchemaError::MissingSchemaName`] when
    /// the schema carries no name to store it under.
    pub async fn add_schema(&self, schema: &Arc<dyn Schema>) -> Result<(), SchemaError> {
        let name = schema.name().ok_or(SchemaError::MissingSchemaName)?;
        let (type_tag, bytes) = self
            .serialize_schema(schema.as_ref())
            .ok_or_else(|| SchemaError::missing_serializer(name))?;
        self.store
            .save(&type_tag, &SchemaName::new(name), &BASE64.encode(bytes))
            .await
    }

    fn serialize_schema(&self, schema: &dyn Schema) -> Option<(String, Vec<u8>)> {
        self.serializers.iter().find_map(|serializer| {
            serializer
                .to_bytes(schema)
                .map(|bytes| (serializer.type_tag().to_string(), bytes))
        })
    }
}

#[async_trait]
impl SchemaRegistry for PersistentSchemaRegistry {
    async fn get_schema(&self, name: &SchemaName) -> Result<Option<Arc<dyn Schema>>, SchemaError> {
        let Some(stored) = self.store.load(name).await? else {
            return Ok(None);
        };

        let serializer = self
            .serializers
            .iter()
            .find(|serializer| serializer.type_tag() == stored.type_tag)
            .ok_or_else(|| {
                SchemaError::missing_serializer_for_type(name.as_str(), &stored.type_tag)
            })?;

        let bytes = match BASE64.decode(&stored.schema) {
            Ok(bytes) => bytes,
            Err(error) => {
                log::warn!(
                    target: "schema_registry",
                    "Discarding stored schema '{}' with invalid base64: {}",
                    name,
                    error
                );
                return Ok(None);
            }
        };

        Ok(serializer.from_bytes(&bytes))
    }
}
