use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use super::cache::ReferenceCache;
use super::error::UpsertError;
use crate::models::{DestinationRecord, NaturalKey};
use crate::store::{DestinationId, DestinationStore, StoreError};

/// What an upsert did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Created(DestinationId),
    Updated(DestinationId),
    /// The record was absent and its create guard is off.
    Suppressed,
}

/// Issues the create or update for one record of one entity.
///
/// The decision is driven by the run's cache alone, which makes a second run
/// over the same rows update every record it created the first time.
pub struct UpsertExecutor<'a> {
    store: &'a dyn DestinationStore,
    entity: &'a str,
    key_fields: &'a [&'a str],
    create_guard: Option<&'a str>,
    post_write: &'a [&'a str],
}

impl<'a> UpsertExecutor<'a> {
    pub fn new(store: &'a dyn DestinationStore, entity: &'a str, key_fields: &'a [&'a str]) -> Self {
        Self {
            store,
            entity,
            key_fields,
            create_guard: None,
            post_write: &[],
        }
    }

    /// Boolean field that must not be `false` for a record to be created.
    pub fn create_guard(mut self, field: Option<&'a str>) -> Self {
        self.create_guard = field;
        self
    }

    /// Record methods invoked after every successful write. The first one
    /// the server accepts wins.
    pub fn post_write(mut self, methods: &'a [&'a str]) -> Self {
        self.post_write = methods;
        self
    }

    pub async fn upsert(
        &self,
        cache: &Mutex<ReferenceCache>,
        key: &NaturalKey,
        record: &DestinationRecord,
    ) -> Result<UpsertAction, UpsertError> {
        let existing = cache.lock().await.resolve(key);

        let action = match existing {
            Some(id) => {
                let payload = record.without(self.key_fields);
                if !payload.is_empty() {
                    self.store
                        .update(self.entity, id, &payload)
                        .await
                        .map_err(|e| self.error(key, e))?;
                }
                UpsertAction::Updated(id)
            }
            None => {
                if self.guarded(record) {
                    return Ok(UpsertAction::Suppressed);
                }
                let id = self
                    .store
                    .create(self.entity, record)
                    .await
                    .map_err(|e| self.error(key, e))?;
                cache.lock().await.register(key.clone(), id);
                UpsertAction::Created(id)
            }
        };

        if let UpsertAction::Created(id) | UpsertAction::Updated(id) = action {
            self.run_post_write(key, id).await?;
        }

        Ok(action)
    }

    async fn run_post_write(&self, key: &NaturalKey, id: DestinationId) -> Result<(), UpsertError> {
        let mut last_error = None;
        for method in self.post_write {
            match self.store.invoke(self.entity, method, id).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!("{}.{} on {} failed: {}", self.entity, method, id, e);
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) => Err(self.error(key, e)),
            None => Ok(()),
        }
    }

    /// Writes only the parent link of an existing record.
    pub async fn link(
        &self,
        key: &NaturalKey,
        id: DestinationId,
        parent_field: &str,
        parent_id: DestinationId,
    ) -> Result<(), UpsertError> {
        let payload = DestinationRecord::new().with(parent_field, parent_id);
        self.store
            .update(self.entity, id, &payload)
            .await
            .map_err(|e| self.error(key, e))
    }

    fn guarded(&self, record: &DestinationRecord) -> bool {
        self.create_guard
            .and_then(|field| record.get(field))
            .is_some_and(|value| *value == JsonValue::Bool(false))
    }

    fn error(&self, key: &NaturalKey, source: StoreError) -> UpsertError {
        UpsertError {
            entity: self.entity.to_string(),
            key: key.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreCall};
    use serde_json::json;

    const KEYS: &[&str] = &["default_code"];

    #[tokio::test]
    async fn test_create_then_update() {
        let store = MemoryStore::new();
        let cache = Mutex::new(ReferenceCache::new("product.template"));
        let executor = UpsertExecutor::new(&store, "product.template", KEYS);
        let key = NaturalKey::new("A1");

        let record = DestinationRecord::new()
            .with("default_code", "A1")
            .with("name", "Widget");
        let created = executor.upsert(&cache, &key, &record).await.unwrap();
        let UpsertAction::Created(id) = created else {
            panic!("expected a create, got {:?}", created);
        };
        assert_eq!(cache.lock().await.resolve(&key), Some(id));

        let record = record.with("name", "Widget v2");
        let updated = executor.upsert(&cache, &key, &record).await.unwrap();
        assert_eq!(updated, UpsertAction::Updated(id));

        match &store.calls()[1] {
            StoreCall::Update { record, .. } => {
                assert!(!record.contains("default_code"));
                assert_eq!(record.get("name"), Some(&json!("Widget v2")));
            }
            other => panic!("expected an update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_create_is_upsert_error() {
        let store = MemoryStore::new();
        store.reject_method("create");
        let cache = Mutex::new(ReferenceCache::new("product.template"));
        let executor = UpsertExecutor::new(&store, "product.template", KEYS);

        let key = NaturalKey::new("A1");
        let record = DestinationRecord::new().with("default_code", "A1");
        let err = executor.upsert(&cache, &key, &record).await.unwrap_err();
        assert_eq!(err.key, key);
        assert!(cache.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_guard_suppresses_inactive_records() {
        let store = MemoryStore::new();
        let cache = Mutex::new(ReferenceCache::new("hr.employee"));
        let executor =
            UpsertExecutor::new(&store, "hr.employee", &["barcode"]).create_guard(Some("active"));

        let key = NaturalKey::new("15");
        let record = DestinationRecord::new()
            .with("barcode", "15")
            .with("active", false);
        let action = executor.upsert(&cache, &key, &record).await.unwrap();
        assert_eq!(action, UpsertAction::Suppressed);
        assert!(store.calls().is_empty());

        let id = store.seed("hr.employee", DestinationRecord::new().with("barcode", "15"));
        cache.lock().await.register(key.clone(), id);
        let action = executor.upsert(&cache, &key, &record).await.unwrap();
        assert_eq!(action, UpsertAction::Updated(id));
    }

    #[tokio::test]
    async fn test_post_write_runs_after_write() {
        let store = MemoryStore::new();
        let cache = Mutex::new(ReferenceCache::new("stock.quant"));
        let keys: &[&str] = &["product_id", "location_id"];
        let executor = UpsertExecutor::new(&store, "stock.quant", keys)
            .post_write(&["action_apply_inventory"]);

        let key = NaturalKey::new("5/2");
        let record = DestinationRecord::new()
            .with("product_id", 5)
            .with("location_id", 2)
            .with("inventory_quantity", 12.0);
        let action = executor.upsert(&cache, &key, &record).await.unwrap();
        let UpsertAction::Created(id) = action else {
            panic!("expected a create, got {:?}", action);
        };

        assert_eq!(
            store.calls().last(),
            Some(&StoreCall::Invoke {
                entity: "stock.quant".into(),
                method: "action_apply_inventory".into(),
                id,
            })
        );
    }

    #[tokio::test]
    async fn test_post_write_falls_back_to_next_method() {
        let store = MemoryStore::new();
        store.reject_method("action_apply_inventory");
        let cache = Mutex::new(ReferenceCache::new("stock.quant"));
        let keys: &[&str] = &["product_id", "location_id"];
        let executor = UpsertExecutor::new(&store, "stock.quant", keys)
            .post_write(&["action_apply_inventory", "apply_inventory"]);

        let key = NaturalKey::new("5/2");
        let record = DestinationRecord::new()
            .with("product_id", 5)
            .with("location_id", 2);
        let action = executor.upsert(&cache, &key, &record).await.unwrap();
        assert!(matches!(action, UpsertAction::Created(_)));

        let methods: Vec<String> = store
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Invoke { method, .. } => Some(method),
                _ => None,
            })
            .collect();
        assert_eq!(methods, vec!["action_apply_inventory", "apply_inventory"]);
    }

    #[tokio::test]
    async fn test_post_write_failure_fails_the_record() {
        let store = MemoryStore::new();
        store.reject_method("action_apply_inventory");
        let cache = Mutex::new(ReferenceCache::new("stock.quant"));
        let keys: &[&str] = &["product_id", "location_id"];
        let executor = UpsertExecutor::new(&store, "stock.quant", keys)
            .post_write(&["action_apply_inventory"]);

        let key = NaturalKey::new("5/2");
        let record = DestinationRecord::new()
            .with("product_id", 5)
            .with("location_id", 2);
        let err = executor.upsert(&cache, &key, &record).await.unwrap_err();
        assert_eq!(err.key, key);
        assert!(err.to_string().contains("action_apply_inventory"));
    }

    #[tokio::test]
    async fn test_link_writes_parent_only() {
        let store = MemoryStore::new();
        let id = store.seed(
            "product.category",
            DestinationRecord::new().with("x_sankhya_id", "11"),
        );
        let executor = UpsertExecutor::new(&store, "product.category", &["x_sankhya_id"]);

        executor
            .link(&NaturalKey::new("11"), id, "parent_id", 3)
            .await
            .unwrap();
        assert_eq!(
            store.calls(),
            vec![StoreCall::Update {
                entity: "product.category".into(),
                id,
                record: DestinationRecord::new().with("parent_id", 3),
            }]
        );
    }
}
