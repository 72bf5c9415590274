//! Runs several domains in dependency order.

use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};

use super::engine::SyncEngine;
use super::error::SyncError;
use super::outcome::SyncOutcome;
use crate::domains::DomainSpec;
use crate::models::Domain;

/// A domain to synchronize with the query to read it.
#[derive(Debug, Clone)]
pub struct SyncJob {
    pub spec: DomainSpec,
    pub query: String,
}

#[derive(Debug)]
pub struct DomainReport {
    pub domain: Domain,
    pub result: Result<SyncOutcome, SyncError>,
}

impl DomainReport {
    pub fn has_failures(&self) -> bool {
        match &self.result {
            Ok(outcome) => outcome.has_failures(),
            Err(_) => true,
        }
    }
}

/// Runs jobs stage by stage. Jobs of one stage run concurrently. A job is
/// reported as not run when one of its dependencies failed fatally or was
/// itself not run; unrelated domains always run.
pub async fn run_staged(engine: &SyncEngine<'_>, jobs: Vec<SyncJob>) -> Vec<DomainReport> {
    let mut stages: BTreeMap<u8, Vec<SyncJob>> = BTreeMap::new();
    for job in jobs {
        stages.entry(job.spec.domain.stage()).or_default().push(job);
    }

    let mut reports = Vec::new();
    let mut failed: HashSet<Domain> = HashSet::new();

    for (stage, jobs) in stages {
        let (blocked, runnable): (Vec<_>, Vec<_>) = jobs.into_iter().partition(|job| {
            job.spec
                .domain
                .depends_on()
                .iter()
                .any(|dep| failed.contains(dep))
        });

        for job in blocked {
            let domain = job.spec.domain;
            let cause = domain
                .depends_on()
                .iter()
                .copied()
                .find(|dep| failed.contains(dep))
                .unwrap_or(domain);
            tracing::warn!("{} not run: {} failed", domain, cause);
            failed.insert(domain);
            reports.push(DomainReport {
                domain,
                result: Err(SyncError::NotRun(cause)),
            });
        }

        tracing::debug!("Starting stage {} with {} domain(s)", stage, runnable.len());
        let results =
            join_all(runnable.iter().map(|job| engine.run(&job.spec, &job.query))).await;

        for (job, result) in runnable.iter().zip(results) {
            if let Err(e) = &result {
                tracing::error!("{} sync aborted: {}", job.spec.domain, e);
                failed.insert(job.spec.domain);
            }
            reports.push(DomainReport {
                domain: job.spec.domain,
                result,
            });
        }
    }

    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::spec;
    use crate::models::SourceRow;
    use crate::source::{SourceError, SourceReader, StaticSource};
    use crate::store::MemoryStore;

    fn job(domain: Domain) -> SyncJob {
        let spec = spec(domain);
        let query = spec.query.to_string();
        SyncJob { spec, query }
    }

    #[tokio::test]
    async fn test_runs_every_stage() {
        let source = StaticSource::new(vec![SourceRow::new()]);
        let store = MemoryStore::new();
        let engine = SyncEngine::new(&source, &store);

        let reports = run_staged(
            &engine,
            vec![job(Domain::Stock), job(Domain::Products), job(Domain::Categories)],
        )
        .await;

        let order: Vec<Domain> = reports.iter().map(|r| r.domain).collect();
        assert_eq!(order, vec![Domain::Categories, Domain::Products, Domain::Stock]);
        assert!(reports.iter().all(|r| r.result.is_ok()));
    }

    #[tokio::test]
    async fn test_fatal_error_stops_later_stages() {
        let source = StaticSource::failing(SourceError::QueryExecution("bad SQL".into()));
        let store = MemoryStore::new();
        let engine = SyncEngine::new(&source, &store);

        let reports = run_staged(&engine, vec![job(Domain::Categories), job(Domain::Products)]).await;

        assert!(matches!(reports[0].result, Err(SyncError::Source(_))));
        assert!(matches!(
            reports[1].result,
            Err(SyncError::NotRun(Domain::Categories))
        ));
        assert_eq!(source.reads(), 1);
        assert!(reports.iter().all(DomainReport::has_failures));
    }

    /// Fails every query that reads the HR tables.
    struct HrOffline;

    #[async_trait::async_trait]
    impl SourceReader for HrOffline {
        async fn read(&self, query: &str) -> Result<Vec<SourceRow>, SourceError> {
            if query.contains("VETORH") {
                Err(SourceError::QueryExecution("ORA-12541: no listener".into()))
            } else {
                Ok(Vec::new())
            }
        }
    }

    #[tokio::test]
    async fn test_unrelated_failure_does_not_block_later_stages() {
        let source = HrOffline;
        let store = MemoryStore::new();
        let engine = SyncEngine::new(&source, &store);

        let reports = run_staged(
            &engine,
            vec![
                job(Domain::Employees),
                job(Domain::Categories),
                job(Domain::Locations),
                job(Domain::Products),
                job(Domain::Stock),
            ],
        )
        .await;

        for report in &reports {
            match report.domain {
                Domain::Employees => assert!(matches!(report.result, Err(SyncError::Source(_)))),
                _ => assert!(report.result.is_ok(), "{} did not run", report.domain),
            }
        }
    }

    #[tokio::test]
    async fn test_failure_blocks_dependents_transitively() {
        let source = StaticSource::failing(SourceError::QueryExecution("bad SQL".into()));
        let store = MemoryStore::new();
        let engine = SyncEngine::new(&source, &store);

        let reports = run_staged(
            &engine,
            vec![job(Domain::Categories), job(Domain::Products), job(Domain::Stock)],
        )
        .await;

        assert!(matches!(
            reports[1].result,
            Err(SyncError::NotRun(Domain::Categories))
        ));
        assert!(matches!(
            reports[2].result,
            Err(SyncError::NotRun(Domain::Products))
        ));
        assert_eq!(source.reads(), 1);
    }
}
