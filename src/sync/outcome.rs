use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::hierarchy::HierarchyDiagnostics;
use crate::models::Domain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Skipped,
    Failed,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::Skipped => write!(f, "skipped"),
            IssueKind::Failed => write!(f, "failed"),
        }
    }
}

/// A row that was not fully synchronized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    /// Natural key, or the row's key columns when no key could be built.
    pub key: String,
    pub kind: IssueKind,
    pub reason: String,
}

/// Result of synchronizing one domain.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub domain: Domain,
    pub entity: String,
    pub rows_read: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Parent links written by the second hierarchy pass.
    pub linked: usize,
    pub issues: Vec<Issue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<HierarchyDiagnostics>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncOutcome {
    pub fn new(domain: Domain, entity: impl Into<String>) -> Self {
        Self {
            domain,
            entity: entity.into(),
            rows_read: 0,
            created: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            linked: 0,
            issues: Vec::new(),
            diagnostics: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn skip(&mut self, key: impl Into<String>, reason: impl Into<String>) {
        let key = key.into();
        let reason = reason.into();
        tracing::warn!("{} '{}' skipped: {}", self.domain, key, reason);
        self.skipped += 1;
        self.issues.push(Issue {
            key,
            kind: IssueKind::Skipped,
            reason,
        });
    }

    pub fn fail(&mut self, key: impl Into<String>, reason: impl Into<String>) {
        let key = key.into();
        let reason = reason.into();
        tracing::warn!("{} '{}' failed: {}", self.domain, key, reason);
        self.failed += 1;
        self.issues.push(Issue {
            key,
            kind: IssueKind::Failed,
            reason,
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Rows written in the first pass.
    pub fn written(&self) -> usize {
        self.created + self.updated
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} read, {} created, {} updated, {} skipped, {} failed",
            self.domain, self.rows_read, self.created, self.updated, self.skipped, self.failed
        )?;
        if self.diagnostics.is_some() {
            write!(f, ", {} linked", self.linked)?;
        }
        Ok(())
    }
}
