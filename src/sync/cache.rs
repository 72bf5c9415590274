//! Natural key to destination id lookup tables.
//!
//! A cache lives for one run. It is filled by a single bulk read and then
//! appended to after every create, so later rows resolve records created
//! earlier in the same run without another remote read.

use std::collections::HashMap;

use super::error::SyncError;
use crate::models::NaturalKey;
use crate::store::{DestinationId, DestinationStore};

#[derive(Debug, Clone, Default)]
pub struct ReferenceCache {
    entity: String,
    entries: HashMap<NaturalKey, DestinationId>,
}

impl ReferenceCache {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            entries: HashMap::new(),
        }
    }

    pub fn with_entries(
        entity: impl Into<String>,
        entries: HashMap<NaturalKey, DestinationId>,
    ) -> Self {
        Self {
            entity: entity.into(),
            entries,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Absence is not an error.
    pub fn resolve(&self, key: &NaturalKey) -> Option<DestinationId> {
        self.entries.get(key).copied()
    }

    pub fn register(&mut self, key: NaturalKey, id: DestinationId) {
        self.entries.insert(key, id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Loads every record of `entity` keyed by `key_fields`.
pub async fn preload(
    store: &dyn DestinationStore,
    entity: &str,
    key_fields: &[&str],
) -> Result<ReferenceCache, SyncError> {
    let entries = store
        .bulk_find(entity, key_fields)
        .await
        .map_err(|source| SyncError::Store {
            entity: entity.to_string(),
            source,
        })?;
    tracing::debug!("Preloaded {} {} key(s)", entries.len(), entity);
    Ok(ReferenceCache::with_entries(entity, entries))
}

/// Caches for foreign references, one per entity and key field list.
#[derive(Debug, Default)]
pub struct ReferenceSet {
    caches: HashMap<(String, String), ReferenceCache>,
}

fn slot(entity: &str, key_fields: &[&str]) -> (String, String) {
    (entity.to_string(), key_fields.join(","))
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preloads the lookup unless it is already loaded.
    pub async fn load(
        &mut self,
        store: &dyn DestinationStore,
        entity: &str,
        key_fields: &[&str],
    ) -> Result<(), SyncError> {
        let slot = slot(entity, key_fields);
        if self.caches.contains_key(&slot) {
            return Ok(());
        }
        let cache = preload(store, entity, key_fields).await?;
        self.caches.insert(slot, cache);
        Ok(())
    }

    pub fn resolve(
        &self,
        entity: &str,
        key_fields: &[&str],
        key: &NaturalKey,
    ) -> Option<DestinationId> {
        self.caches
            .get(&slot(entity, key_fields))
            .and_then(|cache| cache.resolve(key))
    }

    pub fn register(
        &mut self,
        entity: &str,
        key_fields: &[&str],
        key: NaturalKey,
        id: DestinationId,
    ) {
        self.caches
            .entry(slot(entity, key_fields))
            .or_insert_with(|| ReferenceCache::new(entity))
            .register(key, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DestinationRecord;
    use crate::store::{MemoryStore, StoreCall};

    #[test]
    fn test_resolve_and_register() {
        let mut cache = ReferenceCache::new("product.category");
        let key = NaturalKey::new("10");
        assert_eq!(cache.resolve(&key), None);

        cache.register(key.clone(), 4);
        assert_eq!(cache.resolve(&key), Some(4));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_preload_reads_once() {
        let store = MemoryStore::new();
        let id = store.seed(
            "uom.uom",
            DestinationRecord::new().with("name", "Units"),
        );

        let cache = preload(&store, "uom.uom", &["name"]).await.unwrap();
        assert_eq!(cache.resolve(&NaturalKey::new("Units")), Some(id));
        assert_eq!(
            store.calls(),
            vec![StoreCall::BulkFind {
                entity: "uom.uom".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_preload_failure_is_fatal() {
        let store = MemoryStore::new();
        store.reject_method("search_read");

        let err = preload(&store, "uom.uom", &["name"]).await.unwrap_err();
        assert!(matches!(err, SyncError::Store { .. }));
    }

    #[tokio::test]
    async fn test_reference_set_loads_each_pair_once() {
        let store = MemoryStore::new();
        let mut refs = ReferenceSet::new();
        refs.load(&store, "uom.uom", &["name"]).await.unwrap();
        refs.load(&store, "uom.uom", &["name"]).await.unwrap();
        assert_eq!(store.calls().len(), 1);

        refs.register("uom.uom", &["name"], NaturalKey::new("kg"), 3);
        assert_eq!(
            refs.resolve("uom.uom", &["name"], &NaturalKey::new("kg")),
            Some(3)
        );
    }

    #[tokio::test]
    async fn test_reference_set_scoped_lookup() {
        let store = MemoryStore::new();
        let us_country = 233;
        store.seed(
            "res.country.state",
            DestinationRecord::new().with("code", "PA").with("country_id", 31),
        );
        let us = store.seed(
            "res.country.state",
            DestinationRecord::new()
                .with("code", "PA")
                .with("country_id", us_country),
        );

        let mut refs = ReferenceSet::new();
        let fields = ["code", "country_id"];
        refs.load(&store, "res.country.state", &fields).await.unwrap();
        let key = DestinationRecord::new()
            .with("code", "PA")
            .with("country_id", us_country)
            .natural_key(&fields)
            .unwrap();
        assert_eq!(refs.resolve("res.country.state", &fields, &key), Some(us));
        assert_eq!(
            refs.resolve("res.country.state", &["code"], &NaturalKey::new("PA")),
            None
        );
    }
}
