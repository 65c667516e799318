//! Caching wrapper around any schema registry
//!
//! Adds a process-local cache with single-flight fetches: concurrent
//! requests for the same name share one in-flight lookup against the source
//! registry instead of issuing duplicates.

use crate::typestream::schema::error::SchemaError;
use crate::typestream::schema::types::{Schema, SchemaName, SchemaRegistry};
use async_trait::async_trait;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type FetchResult = Result<Option<Arc<dyn Schema>>, SchemaError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Options for [`CachedSchemaRegistry`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CachedRegistryOptions {
    /// When set, a cache miss in `get_schema` falls through to the source
    /// registry and caches the result. When unset, `get_schema` is a pure
    /// cache lookup and entries only appear through `cache_if_needed`.
    pub resolve_if_not_cached: bool,
}

/// A schema that failed to resolve during [`CachedSchemaRegistry::cache_if_needed`].
#[derive(Debug, Clone)]
pub struct FailedSchema {
    pub schema: SchemaName,
    pub error: SchemaError,
}

/// Outcome of [`CachedSchemaRegistry::cache_if_needed`]: a three-way
/// partition of the requested names. `cached` lists every name now present
/// in the cache, including entries that were already cached before the call.
#[derive(Debug, Clone, Default)]
pub struct CacheReport {
    pub cached: Vec<SchemaName>,
    pub missing: Vec<SchemaName>,
    pub failed: Vec<FailedSchema>,
}

/// Wraps a source registry with a local schema cache.
///
/// Entries are added through [`cache_if_needed`](Self::cache_if_needed) (or
/// lazily by `get_schema` when [`CachedRegistryOptions::resolve_if_not_cached`]
/// is set) and never evicted except through [`delete`](Self::delete) or
/// [`reset_all`](Self::reset_all).
pub struct CachedSchemaRegistry {
    registry: Arc<dyn SchemaRegistry>,
    resolve_if_not_cached: bool,
    cache: Arc<Mutex<HashMap<String, Arc<dyn Schema>>>>,
    pending: Arc<Mutex<HashMap<String, SharedFetch>>>,
}

impl CachedSchemaRegistry {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self::with_options(registry, CachedRegistryOptions::default())
    }

    pub fn with_options(registry: Arc<dyn SchemaRegistry>, options: CachedRegistryOptions) -> Self {
        CachedSchemaRegistry {
            registry,
            resolve_if_not_cached: options.resolve_if_not_cached,
            cache: Arc::new(Mutex::new(HashMap::new())),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Ensure every given name is resolved into the cache.
    ///
    /// Deduplicates the input, skips names already cached, and fetches the
    /// remainder concurrently. One name's failure never affects the others;
    /// failures are reported as data and the call itself never fails.
    pub async fn cache_if_needed(&self, schemas: &[SchemaName]) -> CacheReport {
        let mut report = CacheReport {
            cached: self
                .cache
                .lock()
                .expect("schema cache lock poisoned")
                .keys()
                .map(|name| SchemaName::new(name.clone()))
                .collect(),
            ..Default::default()
        };

        let mut to_fetch: Vec<&SchemaName> = Vec::new();
        for name in schemas {
            if !self.is_cached(name) && !to_fetch.contains(&name) {
                to_fetch.push(name);
            }
        }

        let results = futures::future::join_all(
            to_fetch
                .into_iter()
                .map(|name| async move { (name.clone(), self.fetch_schema(name).await) }),
        )
        .await;

        for (name, result) in results {
            match result {
                Ok(Some(_)) => report.cached.push(name),
                Ok(None) => report.missing.push(name),
                Err(error) => report.failed.push(FailedSchema {
                    schema: name,
                    error,
                }),
            }
        }
        report
    }

    pub fn is_cached(&self, name: &SchemaName) -> bool {
        self.cache
            .lock()
            .expect("schema cache lock poisoned")
            .contains_key(name.as_str())
    }

    pub fn delete(&self, name: &SchemaName) {
        self.cache
            .lock()
            .expect("schema cache lock poisoned")
            .remove(name.as_str());
    }

    pub fn reset_all(&self) {
        self.cache
            .lock()
            .expect("schema cache lock poisoned")
            .clear();
    }

    /// Fetch a name from the source registry, sharing one in-flight lookup
    /// between all concurrent callers of the same name. Successful results
    /// are cached before any waiter observes them.
    async fn fetch_schema(&self, name: &SchemaName) -> FetchResult {
        let fetch = {
            let mut pending = self.pending.lock().expect("pending fetch lock poisoned");
            match pending.get(name.as_str()) {
                Some(fetch) => fetch.clone(),
                None => {
                    let registry = Arc::clone(&self.registry);
                    let cache = Arc::clone(&self.cache);
                    let pending_map = Arc::clone(&self.pending);
                    let schema_name = name.clone();
                    let fetch = async move {
                        let result = registry.get_schema(&schema_name).await;
                        if let Ok(Some(schema)) = &result {
                            cache
                                .lock()
                                .expect("schema cache lock poisoned")
                                .insert(schema_name.as_str().to_string(), Arc::clone(schema));
                        }
                        // The body runs exactly once, so this entry is
                        // removed exactly once, before any waiter resumes.
                        pending_map
                            .lock()
                            .expect("pending fetch lock poisoned")
                            .remove(schema_name.as_str());
                        result
                    }
                    .boxed()
                    .shared();
                    pending.insert(name.as_str().to_string(), fetch.clone());
                    fetch
                }
            }
        };
        fetch.await
    }
}

#[async_trait]
impl SchemaRegistry for CachedSchemaRegistry {
    async fn get_schema(&self, name: &SchemaName) -> Result<Option<Arc<dyn Schema>>, SchemaError> {
        let cached = self
            .cache
            .lock()
            .expect("schema cache lock poisoned")
            .get(name.as_str())
            .cloned();
        if let Some(schema) = cached {
            return Ok(Some(schema));
        }
        if self.resolve_if_not_cached {
            return self.fetch_schema(name).await;
        }
        Ok(None)
    }
}
