//! Writer/reader schema compatibility resolution

use crate::typestream::schema::error::SchemaError;
use crate::typestream::schema::types::{
    Schema, SchemaDeserializer, SchemaRef, SchemaRegistry,
};
use serde_json::Value;
use std::sync::Arc;

/// Which writer/reader schema pairs are considered compatible enough to
/// attempt a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaMatching {
    /// All schemas
    Any,
    /// Exact schema name and version match only
    Exact,
    /// Ignore the version suffix and match on the base name
    Similar,
}

/// Reader schema used as a pass-through deserializer when writer and reader
/// names already match.
struct ReaderDeserializer(Arc<dyn Schema>);

impl SchemaDeserializer for ReaderDeserializer {
    fn deserialize(&self, bytes: &[u8]) -> Option<Value> {
        self.0.deserialize(bytes)
    }
}

/// Return a deserializer between writer and reader schema, resolving the
/// writer schema from the registry when it was passed by name.
///
/// A deserializer is only returned when the two schemas pass the matching
/// test: equal names short-circuit to the reader schema itself, `Exact`
/// refuses everything else, `Similar` requires equal base names, and `Any`
/// always attempts a transform. The transform itself is delegated to the
/// writer schema's [`Schema::transform_to`]; this resolver defines no
/// conversion logic of its own.
///
/// Registry failures while resolving the writer schema propagate to the
/// caller; a writer name the registry does not know yields `Ok(None)`.
pub async fn schema_deserializer(
    registry: &dyn SchemaRegistry,
    writer_schema: &SchemaRef,
    matching: SchemaMatching,
    reader_schema: &Arc<dyn Schema>,
) -> Result<Option<Box<dyn SchemaDeserializer>>, SchemaError> {
    let writer_name = writer_schema.name();
    if reader_schema.name() == writer_name {
        return Ok(Some(Box::new(ReaderDeserializer(Arc::clone(reader_schema)))));
    }
    match matching {
        SchemaMatching::Exact => return Ok(None),
        SchemaMatching::Any => {}
        SchemaMatching::Similar => {
            let writer_base = writer_name.map(|name| base_name(name));
            let reader_base = reader_schema.name().map(|name| base_name(name));
            if writer_base != reader_base {
                return Ok(None);
            }
        }
    }
    let writer = match writer_schema {
        SchemaRef::Value(schema) => Some(Arc::clone(schema)),
        SchemaRef::Name(name) => registry.get_schema(name).await?,
    };
    Ok(writer.and_then(|schema| schema.transform_to(reader_schema.as_ref())))
}

fn base_name(name: &str) -> &str {
    name.split_once(':').map(|(base, _)| base).unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typestream::schema::registry::InMemorySchemaRegistry;
    use crate::typestream::schema::test_support::{NumberSchema, TextSchema};
    use crate::typestream::schema::types::SchemaName;

    fn registry_with(schemas: Vec<Arc<dyn Schema>>) -> InMemorySchemaRegistry {
        let registry = InMemorySchemaRegistry::new();
        for schema in schemas {
            registry.add(schema, None).unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn equal_names_return_reader_as_passthrough() {
        let registry = registry_with(vec![]);
        let reader = NumberSchema::new("num:1");
        let writer = SchemaRef::from("num:1");

        let deserializer = schema_deserializer(&registry, &writer, SchemaMatching::Exact, &reader)
            .await
            .unwrap()
            .expect("same name should resolve");
        let bytes = reader.serialize(&serde_json::json!(7)).unwrap();
        assert_eq!(deserializer.deserialize(&bytes), Some(serde_json::json!(7)));
    }

    #[tokio::test]
    async fn exact_matching_rejects_different_versions_of_same_base() {
        let registry = registry_with(vec![NumberSchema::new("num:1")]);
        let reader = NumberSchema::new("num:2");
        let writer = SchemaRef::from("num:1");

        let result = schema_deserializer(&registry, &writer, SchemaMatching::Exact, &reader)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn similar_matching_attempts_transform_across_versions() {
        let registry = registry_with(vec![NumberSchema::new("value:1")]);
        let reader = TextSchema::new("value:2");
        let writer = SchemaRef::from("value:1");

        let deserializer =
            schema_deserializer(&registry, &writer, SchemaMatching::Similar, &reader)
                .await
                .unwrap()
                .expect("same base name should attempt transform");
        let bytes = 42u32.to_le_bytes().to_vec();
        assert_eq!(
            deserializer.deserialize(&bytes),
            Some(serde_json::json!("42"))
        );
    }

    #[tokio::test]
    async fn similar_matching_rejects_different_base_names() {
        let registry = registry_with(vec![NumberSchema::new("num:1")]);
        let reader = TextSchema::new("text:1");
        let writer = SchemaRef::from("num:1");

        let result = schema_deserializer(&registry, &writer, SchemaMatching::Similar, &reader)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn any_matching_transforms_unrelated_names() {
        let registry = registry_with(vec![NumberSchema::new("num:1")]);
        let reader = TextSchema::new("text:9");
        let writer = SchemaRef::from("num:1");

        let deserializer = schema_deserializer(&registry, &writer, SchemaMatching::Any, &reader)
            .await
            .unwrap()
            .expect("any matching should attempt transform");
        let bytes = 3u32.to_le_bytes().to_vec();
        assert_eq!(
            deserializer.deserialize(&bytes),
            Some(serde_json::json!("3"))
        );
    }

    #[tokio::test]
    async fn unresolvable_writer_name_yields_none() {
        let registry = registry_with(vec![]);
        let reader = TextSchema::new("text:1");
        let writer = SchemaRef::from(SchemaName::new("ghost:1"));

        let result = schema_deserializer(&registry, &writer, SchemaMatching::Any, &reader)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn unsupported_transform_pair_yields_none() {
        // Text knows how to become a number, but not another text schema
        let registry = registry_with(vec![TextSchema::new("text:1")]);
        let reader = TextSchema::new("text:2:other");
        let writer = SchemaRef::from("text:1");

        let result = schema_deserializer(&registry, &writer, SchemaMatching::Any, &reader)
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
