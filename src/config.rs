use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    /// Prefix prepended to every table name (`wp_` gives `wp_p2p`).
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Export configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Namespace prefix requested from the exporter; may be renamed on collision.
    #[serde(default = "default_preferred_prefix")]
    pub preferred_prefix: String,
    #[serde(default = "default_plugin_slug")]
    pub plugin_slug: String,
    #[serde(default = "default_plugin_url")]
    pub plugin_url: String,
    #[serde(default = "default_site_title")]
    pub site_title: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            preferred_prefix: default_preferred_prefix(),
            plugin_slug: default_plugin_slug(),
            plugin_url: default_plugin_url(),
            site_title: default_site_title(),
        }
    }
}

/// Import configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    /// Content type assumed when a relationship carries no `to_type`.
    #[serde(default = "default_item_type")]
    pub default_item_type: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            default_item_type: default_item_type(),
        }
    }
}

fn default_table_prefix() -> String {
    "wp_".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_preferred_prefix() -> String {
    "p2p".to_string()
}

fn default_plugin_slug() -> String {
    "p2p-export-import/plugin".to_string()
}

fn default_plugin_url() -> String {
    "https://github.com/pbiron/p2p-export-import".to_string()
}

fn default_site_title() -> String {
    "Exported site".to_string()
}

fn default_item_type() -> String {
    "post".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in P2P_CONFIG environment variable
    /// 2. ./p2p.toml in current directory
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config_path = std::env::var("P2P_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("p2p.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml_str(&config_str)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        // Table names are formatted into SQL, so the prefix must stay an identifier fragment
        let table_prefix = Regex::new(r"^[A-Za-z0-9_]*$")?;
        if !table_prefix.is_match(&self.storage.table_prefix) {
            anyhow::bail!(
                "storage.table_prefix may only contain ASCII letters, digits and '_': {:?}",
                self.storage.table_prefix
            );
        }

        let ncname = Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$")?;
        if !ncname.is_match(&self.export.preferred_prefix) {
            anyhow::bail!(
                "export.preferred_prefix is not a valid XML namespace prefix: {:?}",
                self.export.preferred_prefix
            );
        }

        url::Url::parse(&self.export.plugin_url)
            .with_context(|| format!("export.plugin_url is not a URL: {}", self.export.plugin_url))?;

        if self.import.default_item_type.trim().is_empty() {
            anyhow::bail!("import.default_item_type must not be empty");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.storage.db_path
    }

    /// Get table prefix
    pub fn table_prefix(&self) -> &str {
        &self.storage.table_prefix
    }
}
