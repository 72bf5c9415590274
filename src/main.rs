use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{ConfigCommand, DomainsCommand, StatusCommand, SyncCommand};
use odoo_sync::config::Config;

/// Exit status when the run completed but some records failed.
const EXIT_PARTIAL: i32 = 2;

#[derive(Parser)]
#[command(name = "odoo-sync")]
#[command(version)]
#[command(about = "Synchronize Sankhya master data into Odoo", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize one domain or all of them
    Sync(SyncCommand),

    /// List the synchronized domains
    Domains(DomainsCommand),

    /// Check connectivity to the source and to Odoo
    Status(StatusCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => std::process::exit(EXIT_PARTIAL),
        Ok(false) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "odoo_sync=debug"
    } else {
        "odoo_sync=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Returns true when a sync finished with failures.
async fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(cli.config)?;
    tracing::debug!(version = odoo_sync::version(), "configuration loaded");

    match cli.command {
        Some(Commands::Sync(cmd)) => return cmd.run(&config).await,
        Some(Commands::Domains(cmd)) => cmd.run()?,
        Some(Commands::Status(cmd)) => cmd.run(&config).await?,
        Some(Commands::Config(cmd)) => cmd.run(&config)?,
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(false)
}
