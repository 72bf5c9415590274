//! Sankhya gateway client.
//!
//! Authenticates with OAuth2 client credentials and runs SQL through the
//! `DbExplorerSP.executeQuery` service.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{SourceError, SourceReader};
use crate::models::{SourceRow, Value};

const QUERY_SERVICE: &str = "DbExplorerSP.executeQuery";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Source reader backed by the Sankhya API gateway.
pub struct SankhyaSource {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    x_token: String,
    access_token: Mutex<Option<String>>,
}

impl SankhyaSource {
    /// Creates a source. No request is made until the first read.
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        x_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            x_token: x_token.into(),
            access_token: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Obtains a bearer token, reusing the cached one when present.
    pub async fn authenticate(&self) -> Result<String, SourceError> {
        let mut cached = self.access_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let response = self
            .http
            .post(format!("{}/authenticate", self.base_url))
            .header("X-Token", &self.x_token)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "authentication returned status {}",
                response.status()
            )));
        }

        let token: TokenResponse = response.json().await.map_err(unavailable)?;
        tracing::debug!("Authenticated against Sankhya at {}", self.base_url);
        *cached = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    fn service_url(&self) -> String {
        format!(
            "{}/gateway/v1/mge/service.sbr?serviceName={}&outputType=json",
            self.base_url, QUERY_SERVICE
        )
    }
}

#[async_trait]
impl SourceReader for SankhyaSource {
    async fn read(&self, query: &str) -> Result<Vec<SourceRow>, SourceError> {
        let token = self.authenticate().await?;

        let body = json!({
            "serviceName": QUERY_SERVICE,
            "requestBody": { "sql": query },
        });

        let response = self
            .http
            .post(self.service_url())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "gateway returned status {}",
                response.status()
            )));
        }

        let payload: JsonValue = response.json().await.map_err(unavailable)?;
        let rows = parse_query_response(&payload)?;
        tracing::debug!("Sankhya returned {} row(s)", rows.len());
        Ok(rows)
    }
}

fn unavailable(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Unavailable(format!("request timed out: {}", e))
    } else {
        SourceError::Unavailable(e.to_string())
    }
}

/// Turns a `DbExplorerSP.executeQuery` response into rows.
///
/// Column names come from `responseBody.fieldsMetadata[].name`, values from
/// the positional `responseBody.rows`. Any status other than `"1"` is a
/// rejected query.
pub fn parse_query_response(payload: &JsonValue) -> Result<Vec<SourceRow>, SourceError> {
    let status = match payload.get("status") {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    if status != "1" {
        let message = payload
            .get("statusMessage")
            .and_then(JsonValue::as_str)
            .unwrap_or("unknown gateway error");
        return Err(SourceError::QueryExecution(message.to_string()));
    }

    let body = payload
        .get("responseBody")
        .ok_or_else(|| SourceError::QueryExecution("response has no responseBody".into()))?;

    let columns: Vec<String> = body
        .get("fieldsMetadata")
        .and_then(JsonValue::as_array)
        .map(|fields| {
            fields
                .iter()
                .map(|f| {
                    f.get("name")
                        .and_then(JsonValue::as_str)
                        .unwrap_or_default()
                        .to_string()
                })
                .collect()
        })
        .unwrap_or_default();

    let raw_rows = body
        .get("rows")
        .and_then(JsonValue::as_array)
        .cloned()
        .unwrap_or_default();

    raw_rows
        .iter()
        .map(|raw| {
            let cells = raw.as_array().ok_or_else(|| {
                SourceError::QueryExecution("row is not an array".to_string())
            })?;
            Ok(columns
                .iter()
                .zip(cells)
                .map(|(column, cell)| (column.clone(), Value::from_json(cell)))
                .collect())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_response() {
        let payload = json!({
            "status": "1",
            "responseBody": {
                "fieldsMetadata": [{"name": "CODPROD"}, {"name": "DESCRPROD"}],
                "rows": [[10, "Widget"], [11, null]]
            }
        });

        let rows = parse_query_response(&payload).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("CODPROD"), &Value::Integer(10));
        assert_eq!(rows[0].text("DESCRPROD").as_deref(), Some("Widget"));
        assert_eq!(rows[1].get("DESCRPROD"), &Value::Null);
    }

    #[test]
    fn test_parse_query_response_rejected() {
        let payload = json!({
            "status": "0",
            "statusMessage": "ORA-00942: table or view does not exist"
        });

        let err = parse_query_response(&payload).unwrap_err();
        assert_eq!(
            err,
            SourceError::QueryExecution("ORA-00942: table or view does not exist".into())
        );
    }

    #[test]
    fn test_parse_query_response_empty_result() {
        let payload = json!({
            "status": 1,
            "responseBody": { "fieldsMetadata": [{"name": "A"}], "rows": [] }
        });
        assert!(parse_query_response(&payload).unwrap().is_empty());
    }

    #[test]
    fn test_service_url_trims_trailing_slash() {
        let source = SankhyaSource::new(
            "https://api.sankhya.com.br/",
            "id",
            "secret",
            "token",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(source.base_url(), "https://api.sankhya.com.br");
        assert_eq!(
            source.service_url(),
            "https://api.sankhya.com.br/gateway/v1/mge/service.sbr?serviceName=DbExplorerSP.executeQuery&outputType=json"
        );
    }
}
