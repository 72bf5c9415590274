//! Synchronizes master data from a Sankhya ERP into Odoo.
//!
//! Each [`models::Domain`] pairs a source query with a destination model.
//! The [`sync::SyncEngine`] reads rows, maps them through the domain's field
//! rules and upserts them by natural key, so repeated runs converge on the
//! same destination state.

pub mod config;
pub mod db;
pub mod domains;
pub mod models;
pub mod source;
pub mod store;
pub mod sync;

pub use models::{DestinationRecord, Domain, NaturalKey, SourceRow, Value};
pub use sync::{SyncEngine, SyncError, SyncOutcome};

/// Crate version, as reported by `odoo-sync --version`.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
