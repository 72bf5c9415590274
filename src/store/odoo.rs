//! Odoo JSON-RPC client.
//!
//! Logs in through `common.login` and issues every model call through
//! `object.execute_kw`.

use async_trait::async_trait;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{DestinationId, DestinationStore, Filter, StoreError};
use crate::models::{DestinationRecord, NaturalKey};

/// Records fetched per `search_read` page during bulk reads.
pub const PAGE_SIZE: usize = 1000;

/// Authenticated JSON-RPC session.
pub struct OdooClient {
    http: reqwest::Client,
    endpoint: String,
    db: String,
    uid: i64,
    password: String,
    request_id: AtomicU64,
}

/// Builds the JSON-RPC endpoint from a server URL.
pub fn jsonrpc_url(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    if base.ends_with("/jsonrpc") {
        base.to_string()
    } else {
        format!("{}/jsonrpc", base)
    }
}

/// Extracts `result` from a JSON-RPC reply, turning an `error` member into a
/// rejection of `entity.method`.
pub fn parse_response(
    payload: JsonValue,
    entity: &str,
    method: &str,
) -> Result<JsonValue, StoreError> {
    let mut payload = match payload {
        JsonValue::Object(map) => map,
        other => return Err(StoreError::Protocol(format!("not an object: {}", other))),
    };

    if let Some(error) = payload.get("error") {
        // Server faults carry the useful text in data.message
        let message = error
            .pointer("/data/message")
            .and_then(JsonValue::as_str)
            .or_else(|| error.get("message").and_then(JsonValue::as_str))
            .unwrap_or("unknown error")
            .to_string();
        return Err(StoreError::Rejected {
            entity: entity.to_string(),
            method: method.to_string(),
            message,
        });
    }

    payload
        .remove("result")
        .ok_or_else(|| StoreError::Protocol("reply has neither result nor error".to_string()))
}

impl OdooClient {
    /// Authenticates and returns a ready session.
    pub async fn connect(
        url: &str,
        db: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut client = Self {
            http,
            endpoint: jsonrpc_url(url),
            db: db.to_string(),
            uid: 0,
            password: password.to_string(),
            request_id: AtomicU64::new(1),
        };

        let result = client
            .call("common", "login", json!([db, username, password]))
            .await?;
        client.uid = match result {
            JsonValue::Number(n) => n.as_i64().ok_or_else(|| {
                StoreError::Protocol(format!("login returned a non-integer uid: {}", n))
            })?,
            _ => {
                return Err(StoreError::Unavailable(format!(
                    "authentication failed for user '{}' on database '{}'",
                    username, db
                )))
            }
        };

        tracing::debug!("Logged in to Odoo at {} as uid {}", client.endpoint, client.uid);
        Ok(client)
    }

    pub fn uid(&self) -> i64 {
        self.uid
    }

    async fn call(
        &self,
        service: &str,
        method: &str,
        args: JsonValue,
    ) -> Result<JsonValue, StoreError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": { "service": service, "method": method, "args": args },
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Unavailable(format!(
                "{} returned status {}",
                self.endpoint,
                response.status()
            )));
        }

        let payload: JsonValue = response
            .json()
            .await
            .map_err(|e| StoreError::Protocol(e.to_string()))?;
        parse_response(payload, service, method)
    }

    async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: JsonValue,
        kwargs: JsonValue,
    ) -> Result<JsonValue, StoreError> {
        let call_args = json!([self.db, self.uid, self.password, model, method, args, kwargs]);
        self.call("object", "execute_kw", call_args)
            .await
            .map_err(|e| match e {
                StoreError::Rejected { message, .. } => StoreError::Rejected {
                    entity: model.to_string(),
                    method: method.to_string(),
                    message,
                },
                other => other,
            })
    }

    /// One page of `search_read`, archived records included.
    pub async fn search_read(
        &self,
        model: &str,
        domain: JsonValue,
        fields: &[&str],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Map<String, JsonValue>>, StoreError> {
        let kwargs = json!({
            "fields": fields,
            "offset": offset,
            "limit": limit,
            "order": "id",
            "context": { "active_test": false },
        });
        let result = self
            .execute_kw(model, "search_read", json!([domain]), kwargs)
            .await?;

        match result {
            JsonValue::Array(items) => Ok(items
                .into_iter()
                .filter_map(|item| match item {
                    JsonValue::Object(map) => Some(map),
                    _ => None,
                })
                .collect()),
            other => Err(StoreError::Protocol(format!(
                "search_read on {} returned {}",
                model, other
            ))),
        }
    }

    /// Server version string, e.g. `17.0`.
    pub async fn server_version(&self) -> Result<String, StoreError> {
        let result = self.call("common", "version", json!([])).await?;
        result
            .get("server_version")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| StoreError::Protocol("version reply has no server_version".into()))
    }

    /// Install state of each named module (`installed`, `uninstalled`, ...).
    /// Modules unknown to the server are left out.
    pub async fn module_states(&self, names: &[&str]) -> Result<Vec<(String, String)>, StoreError> {
        let modules = self
            .search_read(
                "ir.module.module",
                json!([["name", "in", names]]),
                &["name", "state"],
                0,
                names.len().max(1),
            )
            .await?;
        Ok(modules
            .iter()
            .filter_map(|m| {
                let name = m.get("name")?.as_str()?;
                let state = m.get("state")?.as_str()?;
                Some((name.to_string(), state.to_string()))
            })
            .collect())
    }

    /// Stock location of the first warehouse, used as the neutral parent of
    /// synchronized locations.
    pub async fn default_stock_location(&self) -> Result<Option<DestinationId>, StoreError> {
        let warehouses = self
            .search_read("stock.warehouse", json!([]), &["lot_stock_id"], 0, 1)
            .await?;
        Ok(warehouses
            .first()
            .and_then(|w| w.get("lot_stock_id"))
            .and_then(many2one_id))
    }
}

fn many2one_id(value: &JsonValue) -> Option<DestinationId> {
    match value {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::Array(items) => items.first().and_then(JsonValue::as_i64),
        _ => None,
    }
}

#[async_trait]
impl DestinationStore for OdooClient {
    async fn find(
        &self,
        entity: &str,
        filter: &Filter,
    ) -> Result<Option<DestinationId>, StoreError> {
        let records = self
            .search_read(entity, filter.to_domain(), &["id"], 0, 1)
            .await?;
        Ok(records
            .first()
            .and_then(|r| r.get("id"))
            .and_then(JsonValue::as_i64))
    }

    async fn create(
        &self,
        entity: &str,
        record: &DestinationRecord,
    ) -> Result<DestinationId, StoreError> {
        let result = self
            .execute_kw(entity, "create", json!([record.fields()]), json!({}))
            .await?;
        many2one_id(&result).ok_or_else(|| {
            StoreError::Protocol(format!("create on {} returned {}", entity, result))
        })
    }

    async fn update(
        &self,
        entity: &str,
        id: DestinationId,
        record: &DestinationRecord,
    ) -> Result<(), StoreError> {
        self.execute_kw(entity, "write", json!([[id], record.fields()]), json!({}))
            .await?;
        Ok(())
    }

    async fn bulk_find(
        &self,
        entity: &str,
        key_fields: &[&str],
    ) -> Result<HashMap<NaturalKey, DestinationId>, StoreError> {
        let mut fields = vec!["id"];
        fields.extend(key_fields.iter().copied());

        let mut found = HashMap::new();
        let mut offset = 0;
        loop {
            let page = self
                .search_read(entity, json!([]), &fields, offset, PAGE_SIZE)
                .await?;
            let page_len = page.len();
            for record in page {
                let id = record.get("id").and_then(JsonValue::as_i64);
                let key = NaturalKey::from_fields(&record, key_fields);
                if let (Some(id), Some(key)) = (id, key) {
                    found.insert(key, id);
                }
            }
            if page_len < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        tracing::debug!("Loaded {} {} record(s) by key", found.len(), entity);
        Ok(found)
    }

    async fn invoke(
        &self,
        entity: &str,
        method: &str,
        id: DestinationId,
    ) -> Result<(), StoreError> {
        self.execute_kw(entity, method, json!([[id]]), json!({}))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jsonrpc_url() {
        assert_eq!(
            jsonrpc_url("https://erp.example.com"),
            "https://erp.example.com/jsonrpc"
        );
        assert_eq!(
            jsonrpc_url("https://erp.example.com/"),
            "https://erp.example.com/jsonrpc"
        );
        assert_eq!(
            jsonrpc_url("http://localhost:8069/jsonrpc"),
            "http://localhost:8069/jsonrpc"
        );
    }

    #[test]
    fn test_parse_response_result() {
        let payload = json!({"jsonrpc": "2.0", "id": 1, "result": [42]});
        let result = parse_response(payload, "product.template", "create").unwrap();
        assert_eq!(result, json!([42]));
    }

    #[test]
    fn test_parse_response_error_prefers_data_message() {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {
                "code": 200,
                "message": "Odoo Server Error",
                "data": {"message": "Invalid field 'foo' on model 'product.template'"}
            }
        });
        let err = parse_response(payload, "product.template", "write").unwrap_err();
        assert_eq!(
            err,
            StoreError::Rejected {
                entity: "product.template".into(),
                method: "write".into(),
                message: "Invalid field 'foo' on model 'product.template'".into(),
            }
        );
    }

    #[test]
    fn test_parse_response_without_result() {
        let err = parse_response(json!({"jsonrpc": "2.0"}), "x", "y").unwrap_err();
        assert!(matches!(err, StoreError::Protocol(_)));
        let err = parse_response(json!("oops"), "x", "y").unwrap_err();
        assert!(matches!(err, StoreError::Protocol(_)));
    }

    #[test]
    fn test_many2one_id() {
        assert_eq!(many2one_id(&json!([7, "WH/Stock"])), Some(7));
        assert_eq!(many2one_id(&json!(9)), Some(9));
        assert_eq!(many2one_id(&json!(false)), None);
    }
}
