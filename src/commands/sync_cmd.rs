//! `sync` command: runs one domain or all of them.

use clap::Args;
use serde_json::json;
use std::str::FromStr;

use super::{connect_store, open_source, OutputFormat};
use odoo_sync::config::{Config, SourceKind};
use odoo_sync::domains::{self, bind_query, load_query};
use odoo_sync::models::Domain;
use odoo_sync::sync::{run_staged, DomainReport, IssueKind, RunOptions, SyncEngine, SyncJob};

/// What to synchronize
#[derive(Debug, Clone, PartialEq)]
pub enum SyncTarget {
    All,
    One(Domain),
}

impl SyncTarget {
    pub fn domains(&self) -> Vec<Domain> {
        match self {
            SyncTarget::All => Domain::ALL.to_vec(),
            SyncTarget::One(domain) => vec![*domain],
        }
    }
}

impl FromStr for SyncTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(SyncTarget::All)
        } else {
            Domain::from_str(s).map(SyncTarget::One)
        }
    }
}

/// Synchronize Sankhya records into Odoo
#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Domain to synchronize (categories, locations, partners, employees,
    /// products, stock) or "all"
    target: SyncTarget,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Only synchronize the first N source rows of each domain
    #[arg(long)]
    limit: Option<usize>,

    /// Read from this source instead of the configured one
    #[arg(long)]
    source: Option<SourceKind>,
}

impl SyncCommand {
    /// Returns true when any domain had failures.
    pub async fn run(&self, config: &Config) -> Result<bool, Box<dyn std::error::Error>> {
        let selected = self.target.domains();

        // Load queries before connecting to either end
        let mut jobs = Vec::with_capacity(selected.len());
        for domain in &selected {
            let query = load_query(*domain, config.queries_dir.value.as_deref())?;
            let query = bind_query(&query, config.employee_company.value);
            jobs.push(SyncJob {
                spec: domains::spec(*domain),
                query,
            });
        }

        let kind = self.source.unwrap_or(config.source.value);
        let source = open_source(config, kind).await?;
        let store = connect_store(config).await?;

        if selected.contains(&Domain::Locations) {
            let default_parent = store.default_stock_location().await?;
            if default_parent.is_none() {
                tracing::warn!("No warehouse found; new locations will have no parent");
            }
            for job in jobs.iter_mut().filter(|j| j.spec.domain == Domain::Locations) {
                job.spec.parent_default = default_parent;
            }
        }

        let engine = SyncEngine::new(source.as_ref(), &store).with_options(RunOptions {
            concurrency: config.concurrency.value,
            limit: self.limit,
        });
        let reports = run_staged(&engine, jobs).await;

        match self.format {
            OutputFormat::Json => print_json(&reports)?,
            OutputFormat::Text => print_text(&reports),
        }

        Ok(reports.iter().any(DomainReport::has_failures))
    }
}

fn print_json(reports: &[DomainReport]) -> Result<(), serde_json::Error> {
    let values = reports
        .iter()
        .map(|report| match &report.result {
            Ok(outcome) => serde_json::to_value(outcome),
            Err(e) => Ok(json!({
                "domain": report.domain,
                "error": e.to_string(),
            })),
        })
        .collect::<Result<Vec<_>, _>>()?;
    println!("{}", serde_json::to_string_pretty(&values)?);
    Ok(())
}

fn print_text(reports: &[DomainReport]) {
    println!("Sync results");
    println!("============");
    println!();

    for report in reports {
        match &report.result {
            Ok(outcome) => {
                let mut line = format!(
                    "  {:<11} {} read, {} created, {} updated, {} skipped, {} failed",
                    outcome.domain.name(),
                    outcome.rows_read,
                    outcome.created,
                    outcome.updated,
                    outcome.skipped,
                    outcome.failed
                );
                if outcome.diagnostics.is_some() {
                    line.push_str(&format!(", {} linked", outcome.linked));
                }
                println!("{}", line);

                for issue in &outcome.issues {
                    let mark = match issue.kind {
                        IssueKind::Skipped => "-",
                        IssueKind::Failed => "✗",
                    };
                    println!("      {} {} {}: {}", mark, issue.kind, issue.key, issue.reason);
                }
                if let Some(diagnostics) = outcome.diagnostics.as_ref().filter(|d| !d.is_clean()) {
                    println!("      hierarchy: {}", diagnostics.summary());
                }
            }
            Err(e) => println!("  {:<11} ✗ {}", report.domain.name(), e),
        }
    }

    println!();
    if reports.iter().any(DomainReport::has_failures) {
        println!("Sync finished with failures.");
    } else {
        println!("Sync complete.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_target_from_str() {
        assert_eq!(SyncTarget::from_str("all").unwrap(), SyncTarget::All);
        assert_eq!(
            SyncTarget::from_str("products").unwrap(),
            SyncTarget::One(Domain::Products)
        );
        assert!(SyncTarget::from_str("invoices").is_err());
    }

    #[test]
    fn test_all_covers_every_domain() {
        assert_eq!(SyncTarget::All.domains().len(), Domain::ALL.len());
        assert_eq!(
            SyncTarget::One(Domain::Stock).domains(),
            vec![Domain::Stock]
        );
    }
}
