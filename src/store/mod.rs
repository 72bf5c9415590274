//! Destination side of a synchronization run.
//!
//! The engine only needs five calls from the remote object store, captured
//! by [`DestinationStore`].

mod memory;
mod odoo;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use thiserror::Error;

use crate::models::{DestinationRecord, NaturalKey};

pub use memory::{MemoryStore, StoreCall};
pub use odoo::{jsonrpc_url, parse_response, OdooClient, PAGE_SIZE};

/// Identifier assigned by the destination store.
pub type DestinationId = i64;

/// Conjunction of equality conditions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    conditions: Vec<(String, JsonValue)>,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::default().and(field, value)
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, JsonValue)] {
        &self.conditions
    }

    /// Odoo search domain: `[[field, "=", value], ...]`.
    pub fn to_domain(&self) -> JsonValue {
        JsonValue::Array(
            self.conditions
                .iter()
                .map(|(field, value)| serde_json::json!([field, "=", value]))
                .collect(),
        )
    }
}

/// Errors raised by a destination call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// The store could not be reached, the login failed or the call timed
    /// out.
    #[error("destination unavailable: {0}")]
    Unavailable(String),
    /// The store answered with an error for this call.
    #[error("{entity}.{method} rejected: {message}")]
    Rejected {
        entity: String,
        method: String,
        message: String,
    },
    /// The store answered with something that is not a valid reply.
    #[error("unexpected response: {0}")]
    Protocol(String),
}

/// Remote object store that receives synchronized records.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// First record of `entity` matching `filter`.
    async fn find(&self, entity: &str, filter: &Filter)
        -> Result<Option<DestinationId>, StoreError>;

    async fn create(
        &self,
        entity: &str,
        record: &DestinationRecord,
    ) -> Result<DestinationId, StoreError>;

    async fn update(
        &self,
        entity: &str,
        id: DestinationId,
        record: &DestinationRecord,
    ) -> Result<(), StoreError>;

    /// Every record of `entity` keyed by the natural key built from
    /// `key_fields`. Records with an incomplete key are left out.
    async fn bulk_find(
        &self,
        entity: &str,
        key_fields: &[&str],
    ) -> Result<HashMap<NaturalKey, DestinationId>, StoreError>;

    /// Calls a record method such as `action_apply_inventory`.
    async fn invoke(&self, entity: &str, method: &str, id: DestinationId)
        -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_to_domain() {
        let filter = Filter::eq("default_code", "A1").and("active", true);
        assert_eq!(
            filter.to_domain(),
            json!([["default_code", "=", "A1"], ["active", "=", true]])
        );
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Rejected {
            entity: "product.template".into(),
            method: "create".into(),
            message: "invalid field".into(),
        };
        assert_eq!(
            err.to_string(),
            "product.template.create rejected: invalid field"
        );
    }
}
