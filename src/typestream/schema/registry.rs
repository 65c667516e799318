//! Process-local schema registry

use crate::typestream::schema::error::SchemaError;
use crate::typestream::schema::types::{Schema, SchemaName, SchemaRegistry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A process-local, map-backed schema registry.
///
/// Lookups never fail; unknown names resolve to `None`. Intended for tests
/// and for wiring static schema sets at startup.
pub struct InMemorySchemaRegistry {
    schemas: RwLock<HashMap<String, Arc<dyn Schema>>>,
}

impl InMemorySchemaRegistry {
    pub fn new() -> Self {
        InMemorySchemaRegistry {
            schemas: RwLock::new(HashMap::new()),
        }
    }

    /// Register a schema under `name`, or under its own name when `name` is
    /// not given. Fails with [`SchemaError::MissingSchemaName`] when neither
    /// is present.
    pub fn add(&self, schema: Arc<dyn Schema>, name: Option<&str>) -> Result<(), SchemaError> {
        let schema_name = match name.or_else(|| schema.name()) {
            Some(name) => name.to_string(),
            None => return Err(SchemaError::MissingSchemaName),
        };
        self.schemas
            .write()
            .expect("schema registry lock poisoned")
            .insert(schema_name, schema);
        Ok(())
    }
}

impl Default for InMemorySchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchemaRegistry for InMemorySchemaRegistry {
    async fn get_schema(&self, name: &SchemaName) -> Result<Option<Arc<dyn Schema>>, SchemaError> {
        Ok(self
            .schemas
            .read()
            .expect("schema registry lock poisoned")
            .get(name.as_str())
            .cloned())
    }
}
