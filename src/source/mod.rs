//! Source side of a synchronization run.
//!
//! A [`SourceReader`] runs one query and returns the complete result set.
//! Reads are all-or-nothing: a failure never yields partial rows, and it is
//! fatal to the domain being synchronized.

mod sankhya;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

use crate::models::SourceRow;

pub use sankhya::{parse_query_response, SankhyaSource};

/// Errors raised while reading from the source.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    /// The source could not be reached, authentication failed or the call
    /// timed out.
    #[error("source unavailable: {0}")]
    Unavailable(String),
    /// The source rejected the query.
    #[error("query execution failed: {0}")]
    QueryExecution(String),
}

/// Executes a query against the source of record.
#[async_trait]
pub trait SourceReader: Send + Sync {
    async fn read(&self, query: &str) -> Result<Vec<SourceRow>, SourceError>;
}

/// Source that serves a fixed set of rows, whatever the query.
#[derive(Debug)]
pub struct StaticSource {
    result: Result<Vec<SourceRow>, SourceError>,
    reads: AtomicUsize,
}

impl StaticSource {
    pub fn new(rows: Vec<SourceRow>) -> Self {
        Self {
            result: Ok(rows),
            reads: AtomicUsize::new(0),
        }
    }

    /// A source whose every read fails with `error`.
    pub fn failing(error: SourceError) -> Self {
        Self {
            result: Err(error),
            reads: AtomicUsize::new(0),
        }
    }

    /// Number of reads served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceReader for StaticSource {
    async fn read(&self, _query: &str) -> Result<Vec<SourceRow>, SourceError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}
