use clap::Args;
use serde_json::json;

use super::OutputFormat;
use odoo_sync::domains;

/// List the synchronized domains
#[derive(Debug, Args)]
pub struct DomainsCommand {
    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl DomainsCommand {
    pub fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let specs = domains::all();
        match self.format {
            OutputFormat::Json => {
                let values: Vec<_> = specs
                    .iter()
                    .map(|spec| {
                        json!({
                            "domain": spec.domain,
                            "entity": spec.entity,
                            "key_fields": spec.key_fields,
                            "hierarchical": spec.hierarchy.is_some(),
                            "stage": spec.domain.stage(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&values)?);
            }
            OutputFormat::Text => {
                println!("{:<11} {:<18} {:<24} {:<6} STAGE", "DOMAIN", "ENTITY", "KEY", "TREE");
                for spec in &specs {
                    println!(
                        "{:<11} {:<18} {:<24} {:<6} {}",
                        spec.domain.name(),
                        spec.entity,
                        spec.key_fields.join(" + "),
                        if spec.hierarchy.is_some() { "yes" } else { "no" },
                        spec.domain.stage()
                    );
                }
            }
        }
        Ok(())
    }
}
