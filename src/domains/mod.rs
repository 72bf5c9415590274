//! Mapping tables for every synchronized domain.
//!
//! Each domain is plain data consumed by the generic engine: the destination
//! entity, how its natural key is built, the field rules and, for trees, the
//! parent link.

mod categories;
mod employees;
mod locations;
mod partners;
mod products;
mod stock;

use std::path::{Path, PathBuf};

use crate::models::Domain;
use crate::store::DestinationId;
use crate::sync::{FieldRule, HierarchySpec, SyncError};

#[derive(Debug, Clone)]
pub struct DomainSpec {
    pub domain: Domain,
    /// Destination model, e.g. `product.template`.
    pub entity: &'static str,
    /// Source columns that identify a row in reports.
    pub key_columns: &'static [&'static str],
    /// Destination fields that make up the natural key.
    pub key_fields: &'static [&'static str],
    pub rules: Vec<FieldRule>,
    pub hierarchy: Option<HierarchySpec>,
    /// Boolean field that must not be `false` on create.
    pub create_guard: Option<&'static str>,
    /// Record method called after each write. Later entries are tried when
    /// the server rejects the earlier ones.
    pub post_write: &'static [&'static str],
    /// Parent given to new nodes until their real parent is linked.
    pub parent_default: Option<DestinationId>,
    /// Built-in source query.
    pub query: &'static str,
}

impl DomainSpec {
    /// Entities referenced by the field rules, with the key fields each is
    /// looked up by.
    pub fn references(&self) -> Vec<(&'static str, Vec<&'static str>)> {
        let mut targets = Vec::new();
        for target in self.rules.iter().filter_map(|r| r.transform.reference_target()) {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        targets
    }
}

pub fn spec(domain: Domain) -> DomainSpec {
    match domain {
        Domain::Categories => categories::spec(),
        Domain::Locations => locations::spec(),
        Domain::Partners => partners::spec(),
        Domain::Employees => employees::spec(),
        Domain::Products => products::spec(),
        Domain::Stock => stock::spec(),
    }
}

pub fn all() -> Vec<DomainSpec> {
    Domain::ALL.iter().map(|d| spec(*d)).collect()
}

/// Query for `domain`: `<queries_dir>/<domain>.sql` when that file exists,
/// else the built-in one.
pub fn load_query(domain: Domain, queries_dir: Option<&Path>) -> Result<String, SyncError> {
    if let Some(path) = queries_dir.map(|dir| query_path(dir, domain)) {
        if path.exists() {
            tracing::debug!("Using query file {}", path.display());
            return std::fs::read_to_string(&path)
                .map_err(|source| SyncError::QueryFile { path, source });
        }
    }
    Ok(spec(domain).query.to_string())
}

/// Placeholder replaced by the configured HR company in employee queries.
pub const COMPANY_PLACEHOLDER: &str = "{company}";

/// Fills the query placeholders.
pub fn bind_query(query: &str, employee_company: u32) -> String {
    query.replace(COMPANY_PLACEHOLDER, &employee_company.to_string())
}

pub fn query_path(dir: &Path, domain: Domain) -> PathBuf {
    dir.join(format!("{}.sql", domain.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_every_domain_has_a_key_and_query() {
        for spec in all() {
            assert!(!spec.key_fields.is_empty(), "{}", spec.domain);
            assert!(!spec.key_columns.is_empty(), "{}", spec.domain);
            assert!(spec.query.contains("SELECT"), "{}", spec.domain);
            for field in spec.key_fields {
                assert!(
                    spec.rules.iter().any(|r| r.field == *field && r.required),
                    "{}: key field {} must be a required rule",
                    spec.domain,
                    field
                );
            }
        }
    }

    #[test]
    fn test_only_trees_have_hierarchy() {
        assert!(spec(Domain::Categories).hierarchy.is_some());
        assert!(spec(Domain::Locations).hierarchy.is_some());
        assert!(spec(Domain::Products).hierarchy.is_none());
        assert!(spec(Domain::Stock).hierarchy.is_none());
    }

    #[test]
    fn test_references_are_deduplicated() {
        let products = spec(Domain::Products);
        let refs = products.references();
        assert_eq!(
            refs,
            vec![
                ("uom.uom", vec!["name"]),
                ("product.category", vec!["x_sankhya_id"])
            ]
        );
    }

    #[test]
    fn test_state_reference_is_scoped_by_country() {
        let refs = spec(Domain::Partners).references();
        assert!(refs.contains(&("res.country", vec!["code"])));
        assert!(refs.contains(&("res.country.state", vec!["code", "country_id"])));
    }

    #[test]
    fn test_employee_query_is_filtered_by_company() {
        let query = bind_query(spec(Domain::Employees).query, 11);
        assert!(query.contains("FUN.NUMEMP = 11"));
        assert!(query.contains("SELECT FUN.NUMEMP,"));
        assert!(!query.contains(COMPANY_PLACEHOLDER));

        let other = bind_query(spec(Domain::Employees).query, 4);
        assert!(other.contains("FUN.NUMEMP = 4"));
    }

    #[test]
    fn test_load_query_prefers_override() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(
            temp_dir.path().join("products.sql"),
            "SELECT CODPROD FROM TGFPRO WHERE CODPROD < 10",
        )
        .unwrap();

        let query = load_query(Domain::Products, Some(temp_dir.path())).unwrap();
        assert!(query.contains("CODPROD < 10"));

        let query = load_query(Domain::Stock, Some(temp_dir.path())).unwrap();
        assert_eq!(query, spec(Domain::Stock).query);

        let query = load_query(Domain::Stock, None).unwrap();
        assert!(query.contains("TGFEST"));
    }
}
