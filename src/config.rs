use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use crate::models::Unit;
use crate::services::SourceSpec;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceSettings>,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    /// L2 cache; L1 only when unset
    pub redis_url: Option<String>,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    #[serde(default)]
    pub default_unit: Unit,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
    #[serde(default = "default_source_name")]
    pub default_source: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_unit: Unit::default(),
            decimals: default_decimals(),
            default_source: default_source_name(),
        }
    }
}

fn default_decimals() -> u32 { 2 }
fn default_source_name() -> String { "zip_code".to_string() }

/// A named table of points
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    pub name: String,
    pub table: String,
    pub id_column: String,
    #[serde(default = "default_lat_column")]
    pub lat_column: String,
    #[serde(default = "default_lon_column")]
    pub lon_column: String,
    #[serde(default)]
    pub filter_columns: Vec<String>,
    #[serde(default)]
    pub display_columns: Vec<String>,
    /// Zero-pad short numeric ids to five digits (zip code sources)
    #[serde(default)]
    pub pad_ids: bool,
}

fn default_lat_column() -> String { "lat".to_string() }
fn default_lon_column() -> String { "lon".to_string() }

impl SourceSettings {
    pub fn spec(&self) -> SourceSpec {
        SourceSpec {
            table: self.table.clone(),
            id_column: self.id_column.clone(),
            lat_column: self.lat_column.clone(),
            lon_column: self.lon_column.clone(),
            filter_columns: self.filter_columns.clone(),
            display_columns: self.display_columns.clone(),
            pad_ids: self.pad_ids,
        }
    }
}

fn default_sources() -> Vec<SourceSettings> {
    let zip = SourceSpec::zip_codes();
    vec![SourceSettings {
        name: default_source_name(),
        table: zip.table,
        id_column: zip.id_column,
        lat_column: zip.lat_column,
        lon_column: zip.lon_column,
        filter_columns: zip.filter_columns,
        display_columns: zip.display_columns,
        pad_ids: zip.pad_ids,
    }]
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with ZIPPY_)
    /// 5. DATABASE_URL
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., ZIPPY__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("ZIPPY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Ok(url) = std::env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", url)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("ZIPPY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Settings of a named source
    pub fn source(&self, name: &str) -> Option<&SourceSettings> {
        self.sources.iter().find(|s| s.name == name)
    }
}
