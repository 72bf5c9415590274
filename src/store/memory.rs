//! In-process destination store.

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{DestinationId, DestinationStore, Filter, StoreError};
use crate::models::{DestinationRecord, NaturalKey};

/// A call received by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Find { entity: String },
    Create { entity: String, record: DestinationRecord },
    Update { entity: String, id: DestinationId, record: DestinationRecord },
    BulkFind { entity: String },
    Invoke { entity: String, method: String, id: DestinationId },
}

#[derive(Debug, Default)]
struct State {
    next_id: DestinationId,
    tables: HashMap<String, BTreeMap<DestinationId, Map<String, JsonValue>>>,
    calls: Vec<StoreCall>,
    rejected_values: Vec<(String, String, JsonValue)>,
    rejected_methods: HashSet<String>,
}

/// Destination store kept in memory. Records every call it receives and can
/// be told to reject some of them.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a record directly, without logging a call.
    pub fn seed(&self, entity: &str, record: DestinationRecord) -> DestinationId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state
            .tables
            .entry(entity.to_string())
            .or_default()
            .insert(id, record.into_map());
        id
    }

    /// Rejects creates and writes on `entity` whose payload sets `field` to
    /// `value`.
    pub fn reject_when(&self, entity: &str, field: &str, value: impl Into<JsonValue>) {
        self.lock()
            .rejected_values
            .push((entity.to_string(), field.to_string(), value.into()));
    }

    /// Rejects every call of `method` (`create`, `write`, `search_read` or a
    /// record method name).
    pub fn reject_method(&self, method: &str) {
        self.lock().rejected_methods.insert(method.to_string());
    }

    pub fn get(&self, entity: &str, id: DestinationId) -> Option<DestinationRecord> {
        self.lock()
            .tables
            .get(entity)
            .and_then(|table| table.get(&id))
            .cloned()
            .map(DestinationRecord::from)
    }

    /// Records of `entity` in id order.
    pub fn records(&self, entity: &str) -> Vec<(DestinationId, DestinationRecord)> {
        self.lock()
            .tables
            .get(entity)
            .map(|table| {
                table
                    .iter()
                    .map(|(id, fields)| (*id, DestinationRecord::from(fields.clone())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn check(
        state: &State,
        entity: &str,
        method: &str,
        record: Option<&DestinationRecord>,
    ) -> Result<(), StoreError> {
        if state.rejected_methods.contains(method) {
            return Err(rejected(entity, method, "method disabled"));
        }
        if let Some(record) = record {
            for (rejected_entity, field, value) in &state.rejected_values {
                if rejected_entity == entity && record.get(field) == Some(value) {
                    return Err(rejected(
                        entity,
                        method,
                        &format!("invalid value {} for field '{}'", value, field),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn rejected(entity: &str, method: &str, message: &str) -> StoreError {
    StoreError::Rejected {
        entity: entity.to_string(),
        method: method.to_string(),
        message: message.to_string(),
    }
}

fn value_matches(stored: &JsonValue, expected: &JsonValue) -> bool {
    match stored {
        JsonValue::Array(items) if !expected.is_array() => items.first() == Some(expected),
        _ => stored == expected,
    }
}

#[async_trait]
impl DestinationStore for MemoryStore {
    async fn find(
        &self,
        entity: &str,
        filter: &Filter,
    ) -> Result<Option<DestinationId>, StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Find {
            entity: entity.to_string(),
        });
        Self::check(&state, entity, "search_read", None)?;

        Ok(state.tables.get(entity).and_then(|table| {
            table
                .iter()
                .find(|(_, fields)| {
                    filter.conditions().iter().all(|(field, value)| {
                        fields.get(field).is_some_and(|stored| value_matches(stored, value))
                    })
                })
                .map(|(id, _)| *id)
        }))
    }

    async fn create(
        &self,
        entity: &str,
        record: &DestinationRecord,
    ) -> Result<DestinationId, StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Create {
            entity: entity.to_string(),
            record: record.clone(),
        });
        Self::check(&state, entity, "create", Some(record))?;

        state.next_id += 1;
        let id = state.next_id;
        state
            .tables
            .entry(entity.to_string())
            .or_default()
            .insert(id, record.fields().clone());
        Ok(id)
    }

    async fn update(
        &self,
        entity: &str,
        id: DestinationId,
        record: &DestinationRecord,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Update {
            entity: entity.to_string(),
            id,
            record: record.clone(),
        });
        Self::check(&state, entity, "write", Some(record))?;

        let stored = state
            .tables
            .get_mut(entity)
            .and_then(|table| table.get_mut(&id))
            .ok_or_else(|| rejected(entity, "write", &format!("record {} does not exist", id)))?;
        for (field, value) in record.fields() {
            stored.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn bulk_find(
        &self,
        entity: &str,
        key_fields: &[&str],
    ) -> Result<HashMap<NaturalKey, DestinationId>, StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::BulkFind {
            entity: entity.to_string(),
        });
        Self::check(&state, entity, "search_read", None)?;

        Ok(state
            .tables
            .get(entity)
            .map(|table| {
                table
                    .iter()
                    .filter_map(|(id, fields)| {
                        NaturalKey::from_fields(fields, key_fields).map(|key| (key, *id))
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn invoke(
        &self,
        entity: &str,
        method: &str,
        id: DestinationId,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Invoke {
            entity: entity.to_string(),
            method: method.to_string(),
            id,
        });
        Self::check(&state, entity, method, None)?;

        let exists = state
            .tables
            .get(entity)
            .is_some_and(|table| table.contains_key(&id));
        if exists {
            Ok(())
        } else {
            Err(rejected(entity, method, &format!("record {} does not exist", id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_then_bulk_find() {
        let store = MemoryStore::new();
        let id = store
            .create(
                "product.template",
                &DestinationRecord::new().with("default_code", "A1"),
            )
            .await
            .unwrap();

        let found = store
            .bulk_find("product.template", &["default_code"])
            .await
            .unwrap();
        assert_eq!(found.get(&NaturalKey::new("A1")), Some(&id));
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryStore::new();
        let id = store.seed(
            "res.partner",
            DestinationRecord::new().with("ref", "7").with("name", "Old"),
        );
        store
            .update("res.partner", id, &DestinationRecord::new().with("name", "New"))
            .await
            .unwrap();

        let record = store.get("res.partner", id).unwrap();
        assert_eq!(record.get("name"), Some(&json!("New")));
        assert_eq!(record.get("ref"), Some(&json!("7")));
    }

    #[tokio::test]
    async fn test_find_matches_many2one_values() {
        let store = MemoryStore::new();
        let id = store.seed(
            "stock.quant",
            DestinationRecord::new()
                .with("product_id", json!([5, "Widget"]))
                .with("location_id", json!([2, "WH/Stock"])),
        );

        let filter = Filter::eq("product_id", 5).and("location_id", 2);
        assert_eq!(store.find("stock.quant", &filter).await.unwrap(), Some(id));
        let filter = Filter::eq("product_id", 6);
        assert_eq!(store.find("stock.quant", &filter).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reject_when_value() {
        let store = MemoryStore::new();
        store.reject_when("product.template", "default_code", "BAD");

        let err = store
            .create(
                "product.template",
                &DestinationRecord::new().with("default_code", "BAD"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected { .. }));
        assert!(store.records("product.template").is_empty());
        assert_eq!(store.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_invoke_unknown_record_is_rejected() {
        let store = MemoryStore::new();
        let err = store
            .invoke("stock.quant", "action_apply_inventory", 99)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
