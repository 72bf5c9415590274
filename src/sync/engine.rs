//! The generic synchronization run.
//!
//! A run reads the whole batch first, so a source failure never leads to a
//! destination write. It then preloads every cache it needs, maps the rows,
//! and writes them either in one flat pass or, for hierarchical domains, in
//! the two passes described in [`super::hierarchy`].

use futures::stream::{self, StreamExt};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::cache::{preload, ReferenceCache, ReferenceSet};
use super::error::{MappingError, SyncError, UpsertError};
use super::hierarchy::{diagnose, sort_nodes, strata, HierarchyNode, HierarchySpec};
use super::mapper::{map_record, OnMissing, ResolvedRefs, Transform};
use super::outcome::SyncOutcome;
use super::upsert::{UpsertAction, UpsertExecutor};
use crate::domains::DomainSpec;
use crate::models::{DestinationRecord, NaturalKey, SourceRow};
use crate::source::SourceReader;
use crate::store::{DestinationId, DestinationStore};

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Writes in flight at once within one stratum.
    pub concurrency: usize,
    /// Only the first `limit` source rows are synchronized.
    pub limit: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            limit: None,
        }
    }
}

/// A mapped row ready to be written.
#[derive(Debug, Clone)]
struct Prepared {
    label: String,
    key: NaturalKey,
    record: DestinationRecord,
    row_index: usize,
}

/// Why a row could not be prepared.
enum RowIssue {
    Skip(String),
    Fail(String),
}

impl From<MappingError> for RowIssue {
    fn from(e: MappingError) -> Self {
        RowIssue::Fail(e.to_string())
    }
}

type WriteResult = (String, Result<UpsertAction, UpsertError>);

pub struct SyncEngine<'a> {
    source: &'a dyn SourceReader,
    store: &'a dyn DestinationStore,
    options: RunOptions,
}

impl<'a> SyncEngine<'a> {
    pub fn new(source: &'a dyn SourceReader, store: &'a dyn DestinationStore) -> Self {
        Self {
            source,
            store,
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Synchronizes one domain. Row-level problems are counted in the
    /// outcome; only source and preload failures abort the run.
    pub async fn run(&self, spec: &DomainSpec, query: &str) -> Result<SyncOutcome, SyncError> {
        let mut outcome = SyncOutcome::new(spec.domain, spec.entity);

        let mut rows = self.source.read(query).await?;
        if let Some(limit) = self.options.limit {
            rows.truncate(limit);
        }
        outcome.rows_read = rows.len();
        tracing::info!("Syncing {}: {} row(s) read", spec.domain, rows.len());

        let mut refs = ReferenceSet::new();
        for (entity, key_fields) in spec.references() {
            refs.load(self.store, entity, &key_fields).await?;
        }
        let cache = Mutex::new(preload(self.store, spec.entity, spec.key_fields).await?);

        let mut prepared = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let label = row_label(row, spec.key_columns, index);
            match self.prepare(spec, row, &mut refs).await {
                Ok((key, record)) => prepared.push(Prepared {
                    label,
                    key,
                    record,
                    row_index: index,
                }),
                Err(RowIssue::Skip(reason)) => outcome.skip(label, reason),
                Err(RowIssue::Fail(reason)) => outcome.fail(label, reason),
            }
        }

        let executor = UpsertExecutor::new(self.store, spec.entity, spec.key_fields)
            .create_guard(spec.create_guard)
            .post_write(spec.post_write);

        match &spec.hierarchy {
            None => {
                let results = self.write_stratum(&executor, &cache, prepared.iter(), None).await;
                record_results(&mut outcome, results);
            }
            Some(hierarchy) => {
                self.reconcile(spec, hierarchy, &executor, &cache, &rows, prepared, &mut outcome)
                    .await;
            }
        }

        outcome.finish();
        tracing::info!("{}", outcome);
        Ok(outcome)
    }

    /// Resolves references, maps the row and derives its natural key.
    ///
    /// References missing from the destination are created only for rows
    /// whose create guard is not `false`.
    async fn prepare(
        &self,
        spec: &DomainSpec,
        row: &SourceRow,
        refs: &mut ReferenceSet,
    ) -> Result<(NaturalKey, DestinationRecord), RowIssue> {
        let (mut resolved, missing) = resolve_references(spec, row, refs)?;
        if !missing.is_empty() {
            if guard_is_off(spec, row, &resolved) {
                tracing::debug!(
                    "Not creating {} reference(s) for a row that will not be created",
                    missing.len()
                );
            } else {
                for reference in missing {
                    let id = self.create_reference(&reference, refs).await?;
                    resolved.insert(reference.field, id);
                }
            }
        }
        let record = map_record(row, &spec.rules, &resolved)?;
        let key = record
            .natural_key(spec.key_fields)
            .ok_or_else(|| MappingError::MissingKey(spec.key_fields.join(", ")))?;
        Ok((key, record))
    }

    async fn create_reference(
        &self,
        reference: &MissingReference,
        refs: &mut ReferenceSet,
    ) -> Result<DestinationId, RowIssue> {
        let entity = reference.entity;
        let id = self
            .store
            .create(entity, &reference.record)
            .await
            .map_err(|e| {
                RowIssue::Fail(format!(
                    "could not create {} '{}': {}",
                    entity, reference.text, e
                ))
            })?;
        tracing::debug!("Created {} '{}' as {}", entity, reference.text, id);
        refs.register(entity, &reference.key_fields, reference.key.clone(), id);
        Ok(id)
    }

    /// Writes items, concurrently across keys and in order within a key.
    async fn write_stratum<'p, I>(
        &self,
        executor: &UpsertExecutor<'_>,
        cache: &Mutex<ReferenceCache>,
        items: I,
        parent_default: Option<(&str, DestinationId)>,
    ) -> Vec<WriteResult>
    where
        I: IntoIterator<Item = &'p Prepared>,
    {
        let mut groups: Vec<Vec<&Prepared>> = Vec::new();
        let mut slots: HashMap<&NaturalKey, usize> = HashMap::new();
        for item in items {
            match slots.get(&item.key) {
                Some(&slot) => groups[slot].push(item),
                None => {
                    slots.insert(&item.key, groups.len());
                    groups.push(vec![item]);
                }
            }
        }

        let results: Vec<Vec<WriteResult>> = stream::iter(groups)
            .map(|group| async move {
                let mut results = Vec::with_capacity(group.len());
                for item in group {
                    let mut record = item.record.clone();
                    if let Some((field, default_id)) = parent_default {
                        if cache.lock().await.resolve(&item.key).is_none() {
                            record.insert(field, default_id);
                        }
                    }
                    let result = executor.upsert(cache, &item.key, &record).await;
                    results.push((item.label.clone(), result));
                }
                results
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        results.into_iter().flatten().collect()
    }

    #[allow(clippy::too_many_arguments)]
    async fn reconcile(
        &self,
        spec: &DomainSpec,
        hierarchy: &HierarchySpec,
        executor: &UpsertExecutor<'_>,
        cache: &Mutex<ReferenceCache>,
        rows: &[SourceRow],
        prepared: Vec<Prepared>,
        outcome: &mut SyncOutcome,
    ) {
        let mut nodes: Vec<HierarchyNode<Prepared>> = prepared
            .into_iter()
            .map(|mut item| {
                item.record.remove(hierarchy.parent_field);
                let key = item.key.clone();
                HierarchyNode::new(key, &rows[item.row_index], hierarchy, item)
            })
            .collect();

        let diagnostics = diagnose(&nodes);
        if !diagnostics.is_clean() {
            tracing::warn!("{} hierarchy: {}", spec.domain, diagnostics.summary());
        }
        outcome.diagnostics = Some(diagnostics);

        sort_nodes(&mut nodes);

        // Pass A
        let parent_default = spec
            .parent_default
            .map(|id| (hierarchy.parent_field, id));
        for stratum in strata(&nodes) {
            let items = stratum.iter().map(|node| &node.payload);
            let results = self
                .write_stratum(executor, cache, items, parent_default)
                .await;
            record_results(outcome, results);
        }
        tracing::debug!("{}: first pass done", spec.domain);

        // Pass B
        let mut last_index: HashMap<&NaturalKey, usize> = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            last_index.insert(&node.key, index);
        }

        for (index, node) in nodes.iter().enumerate() {
            if last_index.get(&node.key) != Some(&index) {
                continue;
            }
            let Some(parent_key) = &node.parent else {
                continue;
            };
            let (own_id, parent_id) = {
                let cache = cache.lock().await;
                (cache.resolve(&node.key), cache.resolve(parent_key))
            };
            let Some(own_id) = own_id else {
                continue;
            };
            let Some(parent_id) = parent_id else {
                outcome.skip(
                    node.payload.label.clone(),
                    format!("parent not found ({})", parent_key),
                );
                continue;
            };

            match executor
                .link(&node.key, own_id, hierarchy.parent_field, parent_id)
                .await
            {
                Ok(()) => outcome.linked += 1,
                Err(e) => outcome.fail(node.payload.label.clone(), e.to_string()),
            }
        }
    }
}

fn record_results(outcome: &mut SyncOutcome, results: Vec<WriteResult>) {
    for (label, result) in results {
        match result {
            Ok(UpsertAction::Created(id)) => {
                tracing::debug!("{} '{}' created as {}", outcome.domain, label, id);
                outcome.created += 1;
            }
            Ok(UpsertAction::Updated(id)) => {
                tracing::debug!("{} '{}' updated ({})", outcome.domain, label, id);
                outcome.updated += 1;
            }
            Ok(UpsertAction::Suppressed) => {
                outcome.skip(label, "inactive record not present in destination")
            }
            Err(e) => outcome.fail(label, e.to_string()),
        }
    }
}

/// A reference not found in the destination, to be created on demand.
struct MissingReference {
    field: &'static str,
    entity: &'static str,
    key_fields: Vec<&'static str>,
    key: NaturalKey,
    record: DestinationRecord,
    text: String,
}

/// Looks up every reference of the row in the preloaded caches.
///
/// A scoped reference is keyed by its own column and the id already resolved
/// for the scope field, so rules naming a scope must follow the rule that
/// resolves it. When that id is unknown the reference is treated as missing.
fn resolve_references(
    spec: &DomainSpec,
    row: &SourceRow,
    refs: &ReferenceSet,
) -> Result<(ResolvedRefs, Vec<MissingReference>), RowIssue> {
    let mut resolved = ResolvedRefs::new();
    let mut missing = Vec::new();
    for rule in &spec.rules {
        let Transform::Reference {
            entity,
            key_field,
            column,
            scope,
            on_missing,
        } = &rule.transform
        else {
            continue;
        };
        let Some(text) = row.text(column) else {
            continue;
        };

        let mut lookup = DestinationRecord::new().with(*key_field, text.as_str());
        let mut key_fields = vec![*key_field];
        let mut scoped = true;
        if let Some(scope) = scope {
            key_fields.push(*scope);
            match resolved.get(scope) {
                Some(&scope_id) => lookup.insert(*scope, scope_id),
                None => scoped = false,
            }
        }
        let key = lookup.natural_key(&key_fields);

        if let Some(id) = key.as_ref().and_then(|k| refs.resolve(entity, &key_fields, k)) {
            resolved.insert(rule.field, id);
            continue;
        }

        match on_missing {
            OnMissing::Omit => {}
            OnMissing::Skip => {
                return Err(RowIssue::Skip(format!("{} '{}' not found", entity, text)));
            }
            OnMissing::Create => match key {
                Some(key) if scoped => missing.push(MissingReference {
                    field: rule.field,
                    entity: *entity,
                    key_fields,
                    key,
                    record: lookup,
                    text,
                }),
                _ => {}
            },
        }
    }
    Ok((resolved, missing))
}

/// Whether the create guard maps to `false` for this row.
fn guard_is_off(spec: &DomainSpec, row: &SourceRow, resolved: &ResolvedRefs) -> bool {
    let Some(field) = spec.create_guard else {
        return false;
    };
    spec.rules
        .iter()
        .filter(|rule| rule.field == field)
        .filter_map(|rule| map_record(row, std::slice::from_ref(rule), resolved).ok())
        .any(|record| record.get(field) == Some(&JsonValue::Bool(false)))
}

/// Identifies a row in issues: its key columns, or its position.
fn row_label(row: &SourceRow, key_columns: &[&str], index: usize) -> String {
    let parts: Vec<String> = key_columns.iter().filter_map(|c| row.text(c)).collect();
    if parts.is_empty() {
        format!("row {}", index + 1)
    } else {
        parts.join(NaturalKey::SEPARATOR)
    }
}
