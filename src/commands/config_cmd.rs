use clap::{Args, Subcommand, ValueEnum};

use odoo_sync::config::Config;

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn or_unset(value: Option<&str>) -> &str {
    value.unwrap_or("(not set)")
}

fn secret(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "********"
    } else {
        "(not set)"
    }
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => print_text(config),
                }
                Ok(())
            }
        }
    }
}

fn print_text(config: &Config) {
    println!("Configuration");
    println!("=============\n");

    if let Some(path) = &config.config_file {
        println!("Config file: {}", path.display());
    } else {
        println!(
            "Config file: {} (not found)",
            Config::default_config_path().display()
        );
    }
    println!();

    println!("source: {}", config.source.value);
    println!("  source: {}", config.source.source);
    println!();

    match &config.queries_dir.value {
        Some(dir) => println!("queries_dir: {}", dir.display()),
        None => println!("queries_dir: (built-in queries)"),
    }
    println!("  source: {}", config.queries_dir.source);
    println!();

    println!("timeout_secs: {}", config.timeout_secs.value);
    println!("  source: {}", config.timeout_secs.source);
    println!();

    println!("concurrency: {}", config.concurrency.value);
    println!("  source: {}", config.concurrency.source);
    println!();

    println!("employee_company: {}", config.employee_company.value);
    println!("  source: {}", config.employee_company.source);
    println!();

    println!("odoo:");
    println!("  url: {}", or_unset(config.odoo.url.as_deref()));
    println!("  db: {}", or_unset(config.odoo.db.as_deref()));
    println!("  username: {}", or_unset(config.odoo.username.as_deref()));
    println!("  password: {}", secret(&config.odoo.password));
    println!();

    println!("sankhya:");
    println!("  base_url: {}", config.sankhya.base_url);
    println!("  client_id: {}", or_unset(config.sankhya.client_id.as_deref()));
    println!("  client_secret: {}", secret(&config.sankhya.client_secret));
    println!("  token: {}", secret(&config.sankhya.token));
    println!();

    println!("sqlite:");
    match &config.sqlite.path {
        Some(path) => println!("  path: {}", path.display()),
        None => println!("  path: (not set)"),
    }
}
