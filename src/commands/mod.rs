mod config_cmd;
mod domains_cmd;
mod status_cmd;
mod sync_cmd;

pub use config_cmd::{ConfigCommand, OutputFormat};
pub use domains_cmd::DomainsCommand;
pub use status_cmd::StatusCommand;
pub use sync_cmd::SyncCommand;

use odoo_sync::config::{Config, ConfigError, SourceKind};
use odoo_sync::db::SqliteSource;
use odoo_sync::source::{SankhyaSource, SourceReader};
use odoo_sync::store::OdooClient;

/// Logs in to Odoo with the configured credentials.
pub async fn connect_store(config: &Config) -> Result<OdooClient, Box<dyn std::error::Error>> {
    let (url, db, username, password) = config.odoo.credentials()?;
    Ok(OdooClient::connect(url, db, username, password, config.timeout()).await?)
}

/// Opens the configured source. Nothing is read yet.
pub async fn open_source(
    config: &Config,
    kind: SourceKind,
) -> Result<Box<dyn SourceReader>, Box<dyn std::error::Error>> {
    match kind {
        SourceKind::Sankhya => Ok(Box::new(sankhya_source(config)?)),
        SourceKind::Sqlite => {
            let path = config.sqlite.path.as_ref().ok_or(ConfigError::Missing {
                key: "sqlite.path",
                env: "ODOO_SYNC_SQLITE_PATH",
            })?;
            Ok(Box::new(SqliteSource::connect(path, config.timeout()).await?))
        }
    }
}

pub fn sankhya_source(config: &Config) -> Result<SankhyaSource, Box<dyn std::error::Error>> {
    let (client_id, client_secret, token) = config.sankhya.credentials()?;
    Ok(SankhyaSource::new(
        &config.sankhya.base_url,
        client_id,
        client_secret,
        token,
        config.timeout(),
    )?)
}
