use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::sync::DEFAULT_CONCURRENCY;

pub const DEFAULT_SANKHYA_URL: &str = "https://api.sankhya.com.br";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// HR company (`NUMEMP`) whose employees are synchronized.
pub const DEFAULT_EMPLOYEE_COMPANY: u32 = 11;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Where source rows are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Sankhya,
    Sqlite,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Sankhya => write!(f, "sankhya"),
            SourceKind::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sankhya" => Ok(SourceKind::Sankhya),
            "sqlite" => Ok(SourceKind::Sqlite),
            _ => Err(format!(
                "Invalid source '{}'. Valid options: sankhya, sqlite",
                s
            )),
        }
    }
}

fn mask<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(_) => serializer.serialize_some("********"),
        None => serializer.serialize_none(),
    }
}

/// Odoo connection settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OdooConfig {
    /// Server URL (e.g., "https://erp.example.com")
    pub url: Option<String>,
    pub db: Option<String>,
    pub username: Option<String>,
    #[serde(serialize_with = "mask")]
    pub password: Option<String>,
}

impl OdooConfig {
    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.db.is_some() && self.username.is_some() && self.password.is_some()
    }

    /// `(url, db, username, password)`, or the first missing setting.
    pub fn credentials(&self) -> Result<(&str, &str, &str, &str), ConfigError> {
        Ok((
            required(&self.url, "odoo.url", "ODOO_URL")?,
            required(&self.db, "odoo.db", "ODOO_DB")?,
            required(&self.username, "odoo.username", "ODOO_USERNAME")?,
            required(&self.password, "odoo.password", "ODOO_PASSWORD")?,
        ))
    }
}

/// Sankhya gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SankhyaConfig {
    pub base_url: String,
    pub client_id: Option<String>,
    #[serde(serialize_with = "mask")]
    pub client_secret: Option<String>,
    /// Gateway token sent as `X-Token`
    #[serde(serialize_with = "mask")]
    pub token: Option<String>,
}

impl Default for SankhyaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SANKHYA_URL.to_string(),
            client_id: None,
            client_secret: None,
            token: None,
        }
    }
}

impl SankhyaConfig {
    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.token.is_some()
    }

    /// `(client_id, client_secret, token)`, or the first missing setting.
    pub fn credentials(&self) -> Result<(&str, &str, &str), ConfigError> {
        Ok((
            required(&self.client_id, "sankhya.client_id", "SANKHYA_CLIENT_ID")?,
            required(
                &self.client_secret,
                "sankhya.client_secret",
                "SANKHYA_CLIENT_SECRET",
            )?,
            required(&self.token, "sankhya.token", "SANKHYA_TOKEN")?,
        ))
    }
}

/// Local SQLite source settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SqliteConfig {
    pub path: Option<PathBuf>,
}

fn required<'a>(
    value: &'a Option<String>,
    key: &'static str,
    env: &'static str,
) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing { key, env })
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub source: ConfigValue<SourceKind>,
    /// Directory with `<domain>.sql` files overriding the built-in queries
    pub queries_dir: ConfigValue<Option<PathBuf>>,
    /// Timeout of every remote call, in seconds
    pub timeout_secs: ConfigValue<u64>,
    /// Concurrent writes within one hierarchy level
    pub concurrency: ConfigValue<usize>,
    /// HR company whose employees are read
    pub employee_company: ConfigValue<u32>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub odoo: OdooConfig,
    pub sankhya: SankhyaConfig,
    pub sqlite: SqliteConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    source: Option<SourceKind>,
    queries_dir: Option<PathBuf>,
    timeout_secs: Option<u64>,
    concurrency: Option<usize>,
    employee_company: Option<u32>,
    odoo: Option<OdooConfig>,
    sankhya: Option<SankhyaConfig>,
    sqlite: Option<SqliteConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_from(config_path, |name| std::env::var(name).ok())
    }

    /// Like [`Config::load`], reading variables through `env`.
    pub fn load_from<F>(config_path: Option<PathBuf>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut source = ConfigValue::new(SourceKind::Sankhya, ConfigSource::Default);
        let mut queries_dir = ConfigValue::new(None, ConfigSource::Default);
        let mut timeout_secs = ConfigValue::new(DEFAULT_TIMEOUT_SECS, ConfigSource::Default);
        let mut concurrency = ConfigValue::new(DEFAULT_CONCURRENCY, ConfigSource::Default);
        let mut employee_company =
            ConfigValue::new(DEFAULT_EMPLOYEE_COMPANY, ConfigSource::Default);
        let mut config_file = None;
        let mut odoo = OdooConfig::default();
        let mut sankhya = SankhyaConfig::default();
        let mut sqlite = SqliteConfig::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            if let Some(kind) = file_config.source {
                source = ConfigValue::new(kind, ConfigSource::File);
            }
            if let Some(dir) = file_config.queries_dir {
                queries_dir = ConfigValue::new(Some(resolve(&path, dir)), ConfigSource::File);
            }
            if let Some(secs) = file_config.timeout_secs {
                timeout_secs = ConfigValue::new(secs, ConfigSource::File);
            }
            if let Some(n) = file_config.concurrency {
                concurrency = ConfigValue::new(n, ConfigSource::File);
            }
            if let Some(company) = file_config.employee_company {
                employee_company = ConfigValue::new(company, ConfigSource::File);
            }
            if let Some(section) = file_config.odoo {
                odoo = section;
            }
            if let Some(section) = file_config.sankhya {
                sankhya = section;
            }
            if let Some(mut section) = file_config.sqlite {
                section.path = section.path.map(|p| resolve(&path, p));
                sqlite = section;
            }

            config_file = Some(path);
        }

        // Apply environment variable overrides
        if let Some(value) = env("ODOO_SYNC_SOURCE") {
            let kind = value.parse().map_err(|_| ConfigError::Invalid {
                name: "ODOO_SYNC_SOURCE",
                value: value.clone(),
            })?;
            source = ConfigValue::new(kind, ConfigSource::Environment);
        }
        if let Some(dir) = env("ODOO_SYNC_QUERIES_DIR") {
            queries_dir = ConfigValue::new(Some(PathBuf::from(dir)), ConfigSource::Environment);
        }
        if let Some(value) = env("ODOO_SYNC_TIMEOUT_SECS") {
            let secs = parse_number("ODOO_SYNC_TIMEOUT_SECS", &value)?;
            timeout_secs = ConfigValue::new(secs, ConfigSource::Environment);
        }
        if let Some(value) = env("ODOO_SYNC_CONCURRENCY") {
            let n = parse_number("ODOO_SYNC_CONCURRENCY", &value)?;
            concurrency = ConfigValue::new(n, ConfigSource::Environment);
        }
        if let Some(value) = env("ODOO_SYNC_EMPLOYEE_COMPANY") {
            let company = parse_number("ODOO_SYNC_EMPLOYEE_COMPANY", &value)?;
            employee_company = ConfigValue::new(company, ConfigSource::Environment);
        }
        // Connection env var overrides
        if let Some(url) = env("ODOO_URL") {
            odoo.url = Some(url);
        }
        if let Some(db) = env("ODOO_DB") {
            odoo.db = Some(db);
        }
        if let Some(username) = env("ODOO_USERNAME") {
            odoo.username = Some(username);
        }
        if let Some(password) = env("ODOO_PASSWORD") {
            odoo.password = Some(password);
        }
        if let Some(url) = env("SANKHYA_BASE_URL") {
            sankhya.base_url = url;
        }
        if let Some(id) = env("SANKHYA_CLIENT_ID") {
            sankhya.client_id = Some(id);
        }
        if let Some(secret) = env("SANKHYA_CLIENT_SECRET") {
            sankhya.client_secret = Some(secret);
        }
        if let Some(token) = env("SANKHYA_TOKEN") {
            sankhya.token = Some(token);
        }
        if let Some(path) = env("ODOO_SYNC_SQLITE_PATH") {
            sqlite.path = Some(PathBuf::from(path));
        }

        Ok(Self {
            source,
            queries_dir,
            timeout_secs,
            concurrency,
            employee_company,
            config_file,
            odoo,
            sankhya,
            sqlite,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.value.max(1))
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/odoo-sync/
    /// - macOS: ~/Library/Application Support/odoo-sync/
    /// - Windows: %APPDATA%/odoo-sync/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("odoo-sync")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

/// Resolve relative paths against the config file's directory
fn resolve(config_path: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        config_path
            .parent()
            .map(|p| p.join(&path))
            .unwrap_or(path)
    } else {
        path
    }
}

fn parse_number<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    Invalid { name: &'static str, value: String },
    Missing { key: &'static str, env: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Invalid { name, value } => {
                write!(f, "Invalid value '{}' for {}", value, name)
            }
            ConfigError::Missing { key, env } => {
                write!(f, "Missing setting '{}' (config file) or {} (environment)", key, env)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load_from(Some(config_path), no_env).unwrap();
        assert_eq!(config.source.value, SourceKind::Sankhya);
        assert_eq!(config.source.source, ConfigSource::Default);
        assert_eq!(config.timeout_secs.value, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.concurrency.value, DEFAULT_CONCURRENCY);
        assert_eq!(config.employee_company.value, DEFAULT_EMPLOYEE_COMPANY);
        assert_eq!(config.sankhya.base_url, DEFAULT_SANKHYA_URL);
        assert!(config.config_file.is_none());
        assert!(!config.odoo.is_configured());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "source: sqlite").unwrap();
        writeln!(file, "queries_dir: queries").unwrap();
        writeln!(file, "concurrency: 2").unwrap();
        writeln!(file, "employee_company: 3").unwrap();
        writeln!(file, "odoo:").unwrap();
        writeln!(file, "  url: https://erp.example.com").unwrap();
        writeln!(file, "  db: prod").unwrap();
        writeln!(file, "sqlite:").unwrap();
        writeln!(file, "  path: extract.db").unwrap();

        let config = Config::load_from(Some(config_path.clone()), no_env).unwrap();
        assert_eq!(config.source.value, SourceKind::Sqlite);
        assert_eq!(config.source.source, ConfigSource::File);
        assert_eq!(
            config.queries_dir.value,
            Some(temp_dir.path().join("queries"))
        );
        assert_eq!(config.concurrency.value, 2);
        assert_eq!(config.employee_company.value, 3);
        assert_eq!(config.employee_company.source, ConfigSource::File);
        assert_eq!(config.timeout_secs.source, ConfigSource::Default);
        assert_eq!(config.odoo.db.as_deref(), Some("prod"));
        assert_eq!(config.sqlite.path, Some(temp_dir.path().join("extract.db")));
        assert_eq!(config.sankhya.base_url, DEFAULT_SANKHYA_URL);
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "timeout_secs: 10").unwrap();
        writeln!(file, "odoo:").unwrap();
        writeln!(file, "  url: https://from-file").unwrap();

        let env: HashMap<&str, &str> = HashMap::from([
            ("ODOO_SYNC_TIMEOUT_SECS", "30"),
            ("ODOO_URL", "https://from-env"),
            ("SANKHYA_TOKEN", "abc"),
            ("ODOO_SYNC_EMPLOYEE_COMPANY", "12"),
        ]);
        let config =
            Config::load_from(Some(config_path), |name| env.get(name).map(|v| v.to_string()))
                .unwrap();

        assert_eq!(config.timeout_secs.value, 30);
        assert_eq!(config.timeout_secs.source, ConfigSource::Environment);
        assert_eq!(config.odoo.url.as_deref(), Some("https://from-env"));
        assert_eq!(config.sankhya.token.as_deref(), Some("abc"));
        assert_eq!(config.employee_company.value, 12);
        assert_eq!(config.employee_company.source, ConfigSource::Environment);
    }

    #[test]
    fn test_invalid_env_number() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let err = Config::load_from(Some(config_path), |name| {
            (name == "ODOO_SYNC_CONCURRENCY").then(|| "many".to_string())
        })
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value 'many' for ODOO_SYNC_CONCURRENCY"
        );
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load_from(Some(config_path), no_env);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_missing_credentials() {
        let odoo = OdooConfig {
            url: Some("https://erp.example.com".into()),
            ..OdooConfig::default()
        };
        let err = odoo.credentials().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing setting 'odoo.db' (config file) or ODOO_DB (environment)"
        );
    }

    #[test]
    fn test_secrets_are_masked() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");
        let config = Config::load_from(Some(config_path), |name| {
            (name == "ODOO_PASSWORD").then(|| "hunter2".to_string())
        })
        .unwrap();

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("********"));
    }
}
