//! SQLite-backed source, for extracts of the ERP database and for tests.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::path::Path;
use std::time::Duration;

use crate::models::{SourceRow, Value};
use crate::source::{SourceError, SourceReader};

/// Source reader that runs queries against a SQLite database.
pub struct SqliteSource {
    pool: SqlitePool,
    timeout: Duration,
}

impl SqliteSource {
    /// Opens the database read-only. A missing file is an unavailable source.
    pub async fn connect(path: &Path, timeout: Duration) -> Result<Self, SourceError> {
        if !path.exists() {
            return Err(SourceError::Unavailable(format!(
                "database '{}' does not exist",
                path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(timeout)
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;

        Ok(Self::from_pool(pool, timeout))
    }

    pub fn from_pool(pool: SqlitePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SourceReader for SqliteSource {
    async fn read(&self, query: &str) -> Result<Vec<SourceRow>, SourceError> {
        let fetch = sqlx::query(query).fetch_all(&self.pool);
        let rows = tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| {
                SourceError::Unavailable(format!(
                    "query timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(map_sqlx_error)?;

        rows.iter().map(convert_row).collect()
    }
}

fn map_sqlx_error(e: sqlx::Error) -> SourceError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Configuration(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => SourceError::Unavailable(e.to_string()),
        other => SourceError::QueryExecution(other.to_string()),
    }
}

/// Converts by the storage class of each value, since SQLite columns carry
/// no enforced type.
fn convert_row(row: &SqliteRow) -> Result<SourceRow, SourceError> {
    let mut converted = SourceRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        let raw = row
            .try_get_raw(index)
            .map_err(|e| SourceError::QueryExecution(e.to_string()))?;

        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_uppercase();
            decode(row, index, &type_name)?
        };
        converted.push(column.name(), value);
    }
    Ok(converted)
}

fn decode(row: &SqliteRow, index: usize, type_name: &str) -> Result<Value, SourceError> {
    let decode_err = |e: sqlx::Error| SourceError::QueryExecution(e.to_string());
    let value = match type_name {
        "INTEGER" | "INT" | "INT8" | "BIGINT" => Value::Integer(
            row.try_get_unchecked::<i64, _>(index)
                .map_err(decode_err)?,
        ),
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => Value::Float(
            row.try_get_unchecked::<f64, _>(index)
                .map_err(decode_err)?,
        ),
        "BOOLEAN" | "BOOL" => Value::Bool(
            row.try_get_unchecked::<bool, _>(index)
                .map_err(decode_err)?,
        ),
        "BLOB" => {
            let bytes = row
                .try_get_unchecked::<Vec<u8>, _>(index)
                .map_err(decode_err)?;
            Value::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => Value::Text(
            row.try_get_unchecked::<String, _>(index)
                .map_err(decode_err)?,
        ),
    };
    Ok(value)
}
