//! Configuration for Songprint
//!
//! TOML-based configuration selecting the catalog backend (PostgreSQL,
//! filesystem or in-memory), the decision thresholds and the analysis
//! parameters. `PG_*` environment variables override the PostgreSQL section.

use crate::config::FeatureConfig;
use crate::error::{Result, SongprintError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SongprintConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub features: FeatureConfig,
}

/// Storage backend configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub filesystem: FilesystemConfig,
    #[serde(default)]
    pub postgresql: PostgresqlConfig,
}

/// Storage backend type
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgresql,
    Filesystem,
    Memory,
}

/// Filesystem backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilesystemConfig {
    #[serde(default = "default_base_directory")]
    pub base_directory: String,
    #[serde(default)]
    pub format: FileFormat,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            base_directory: default_base_directory(),
            format: FileFormat::default(),
        }
    }
}

fn default_base_directory() -> String {
    "./catalog".to_string()
}

/// File format for new filesystem entries (existing entries are read in either)
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Json,
    Bson,
}

/// PostgreSQL backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostgresqlConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Keep the submitted audio file in `songs.audio_data`
    #[serde(default = "default_store_raw_audio")]
    pub store_raw_audio: bool,
}

impl Default for PostgresqlConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: default_database(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
            store_raw_audio: default_store_raw_audio(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    5432
}
fn default_database() -> String {
    "songprint".to_string()
}
fn default_user() -> String {
    "songprint_user".to_string()
}
fn default_password() -> String {
    "songprint_pass".to_string()
}
fn default_max_connections() -> usize {
    10
}
fn default_store_raw_audio() -> bool {
    true
}

/// Decision thresholds, in percent.
///
/// The two thresholds are independent: the scan stops at the first entry
/// scoring at least `early_exit_threshold`, while the verdict and the
/// decision to persist use `duplicate_threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct MatchingConfig {
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f64,
    #[serde(default = "default_early_exit_threshold")]
    pub early_exit_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: default_duplicate_threshold(),
            early_exit_threshold: default_early_exit_threshold(),
        }
    }
}

pub const DEFAULT_DUPLICATE_THRESHOLD: f64 = 70.0;
pub const DEFAULT_EARLY_EXIT_THRESHOLD: f64 = 80.0;

fn default_duplicate_threshold() -> f64 {
    DEFAULT_DUPLICATE_THRESHOLD
}
fn default_early_exit_threshold() -> f64 {
    DEFAULT_EARLY_EXIT_THRESHOLD
}

impl SongprintConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SongprintError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SongprintConfig = toml::from_str(content)
            .map_err(|e| SongprintError::Config(format!("Failed to parse TOML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, else from `songprint.toml` if present, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new("songprint.toml");
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    log::info!("No songprint.toml found, using default configuration");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply `PG_HOST`, `PG_PORT`, `PG_USER`, `PG_PASSWORD` and `PG_DATABASE`
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pg = &mut self.storage.postgresql;
        if let Some(host) = lookup("PG_HOST") {
            pg.host = host;
        }
        if let Some(user) = lookup("PG_USER") {
            pg.user = user;
        }
        if let Some(password) = lookup("PG_PASSWORD") {
            pg.password = password;
        }
        if let Some(database) = lookup("PG_DATABASE") {
            pg.database = database;
        }
        if let Some(port) = lookup("PG_PORT") {
            pg.port = port
                .parse()
                .map_err(|_| SongprintError::Config(format!("PG_PORT is not a port: {}", port)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let m = &self.matching;
        for (name, value) in [
            ("duplicate_threshold", m.duplicate_threshold),
            ("early_exit_threshold", m.early_exit_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(SongprintError::Config(format!(
                    "{} must be within 0-100, got {}",
                    name, value
                )));
            }
        }
        if m.early_exit_threshold < m.duplicate_threshold {
            log::warn!(
                "early_exit_threshold ({}) is below duplicate_threshold ({}); the scan may stop on a non-duplicate",
                m.early_exit_threshold,
                m.duplicate_threshold
            );
        }
        self.features
            .validate()
            .map_err(|e| SongprintError::Config(e.to_string()))
    }

    /// Get PostgreSQL connection string (password elided)
    pub fn connection_string(&self) -> Option<String> {
        match self.storage.backend {
            StorageBackend::Postgresql => {
                let pg = &self.storage.postgresql;
                Some(format!(
                    "postgresql://{}:***@{}:{}/{}",
                    pg.user, pg.host, pg.port, pg.database
                ))
            }
            _ => None,
        }
    }
}
