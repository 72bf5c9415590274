//! Hierarchical, idempotent record synchronization.
//!
//! Every domain goes through the same pipeline:
//!
//! 1. read the full batch from the source,
//! 2. preload the destination ids of every referenced entity and of the
//!    domain's own entity,
//! 3. map each row through the domain's field rules,
//! 4. create or update each record depending on whether its natural key is
//!    already known,
//! 5. for trees, link every node to its parent once all nodes exist.
//!
//! Row-level problems are counted in the [`SyncOutcome`] and never stop the
//! batch.

mod cache;
mod engine;
mod error;
mod hierarchy;
mod mapper;
mod orchestrator;
mod outcome;
mod upsert;

pub use cache::{preload, ReferenceCache, ReferenceSet};
pub use engine::{RunOptions, SyncEngine, DEFAULT_CONCURRENCY};
pub use error::{MappingError, SyncError, UpsertError};
pub use hierarchy::{
    diagnose, sort_nodes, strata, HierarchyDiagnostics, HierarchyNode, HierarchySpec,
    UNDECLARED_DEPTH,
};
pub use mapper::{map_record, FieldRule, OnMissing, ResolvedRefs, Transform, ValueKind};
pub use orchestrator::{run_staged, DomainReport, SyncJob};
pub use outcome::{Issue, IssueKind, SyncOutcome};
pub use upsert::{UpsertAction, UpsertExecutor};
