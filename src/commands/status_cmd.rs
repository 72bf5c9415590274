//! `status` command: checks both ends of the synchronization.

use clap::Args;

use super::{connect_store, open_source, sankhya_source};
use odoo_sync::config::{Config, SourceKind};
use odoo_sync::domains;
use odoo_sync::store::{DestinationStore, Filter};

/// Odoo apps that provide the synchronized models.
const REQUIRED_MODULES: &[&str] = &["product", "stock", "hr", "contacts"];

/// Show configuration and connectivity status
#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        println!("Source");
        println!("======");
        println!();
        println!("Kind: {}", config.source.value);
        match config.source.value {
            SourceKind::Sankhya => {
                println!("URL: {}", config.sankhya.base_url);
                if !config.sankhya.is_configured() {
                    println!("Status: Not configured");
                    println!();
                    println!("Set SANKHYA_CLIENT_ID, SANKHYA_CLIENT_SECRET and SANKHYA_TOKEN,");
                    println!("or add them to the sankhya: section of the config file.");
                } else {
                    match sankhya_source(config)?.authenticate().await {
                        Ok(_) => println!("Status: ✓ Authenticated"),
                        Err(e) => println!("Status: ✗ {}", e),
                    }
                }
            }
            SourceKind::Sqlite => match open_source(config, SourceKind::Sqlite).await {
                Ok(source) => match source.read("SELECT 1").await {
                    Ok(_) => println!("Status: ✓ Readable"),
                    Err(e) => println!("Status: ✗ {}", e),
                },
                Err(e) => println!("Status: ✗ {}", e),
            },
        }
        println!();

        println!("Odoo");
        println!("====");
        println!();
        println!("URL: {}", config.odoo.url.as_deref().unwrap_or("(not set)"));
        if !config.odoo.is_configured() {
            println!("Status: Not configured");
            println!();
            println!("Set ODOO_URL, ODOO_DB, ODOO_USERNAME and ODOO_PASSWORD,");
            println!("or add them to the odoo: section of the config file.");
            return Ok(());
        }

        let store = match connect_store(config).await {
            Ok(store) => store,
            Err(e) => {
                println!("Status: ✗ {}", e);
                return Ok(());
            }
        };
        println!("Status: ✓ Logged in (uid {})", store.uid());
        match store.server_version().await {
            Ok(version) => println!("Server version: {}", version),
            Err(e) => println!("Server version: unknown ({})", e),
        }
        println!();

        println!("Modules:");
        match store.module_states(REQUIRED_MODULES).await {
            Ok(states) => {
                for module in REQUIRED_MODULES {
                    let state = states
                        .iter()
                        .find(|(name, _)| name == module)
                        .map(|(_, state)| state.as_str());
                    let mark = match state {
                        Some("installed") => "✓ installed".to_string(),
                        Some(other) => format!("✗ {}", other),
                        None => "✗ not available".to_string(),
                    };
                    println!("  {:<18} {}", module, mark);
                }
            }
            Err(e) => println!("  ✗ {}", e),
        }
        println!();

        println!("Models:");
        for spec in domains::all() {
            let access = match store.find(spec.entity, &Filter::default()).await {
                Ok(_) => "✓ readable".to_string(),
                Err(e) => format!("✗ {}", e),
            };
            println!("  {:<18} {}", spec.entity, access);
        }

        Ok(())
    }
}
