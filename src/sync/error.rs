use std::path::PathBuf;
use thiserror::Error;

use crate::models::{Domain, NaturalKey};
use crate::source::SourceError;
use crate::store::StoreError;

/// A source row could not be turned into a destination record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("required field '{field}' has no value in column {column}")]
    MissingRequired { field: String, column: String },

    #[error("column {column}: expected {expected}, got '{value}'")]
    Invalid {
        column: String,
        expected: &'static str,
        value: String,
    },

    #[error("record has no natural key ({0})")]
    MissingKey(String),
}

/// A destination write for one record was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{entity} '{key}': {source}")]
pub struct UpsertError {
    pub entity: String,
    pub key: NaturalKey,
    #[source]
    pub source: StoreError,
}

/// Errors that abort a whole domain run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("could not load {entity} from the destination: {source}")]
    Store {
        entity: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to read query file '{}': {source}", path.display())]
    QueryFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not run: depends on {0}, which did not complete")]
    NotRun(Domain),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_error_display() {
        let err = UpsertError {
            entity: "product.template".into(),
            key: NaturalKey::new("A1"),
            source: StoreError::Unavailable("timed out".into()),
        };
        assert_eq!(
            err.to_string(),
            "product.template 'A1': destination unavailable: timed out"
        );
    }

    #[test]
    fn test_mapping_error_display() {
        let err = MappingError::Invalid {
            column: "PESOBRUTO".into(),
            expected: "a number",
            value: "abc".into(),
        };
        assert_eq!(err.to_string(), "column PESOBRUTO: expected a number, got 'abc'");
    }
}
