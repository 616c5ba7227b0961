//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use download_counter_core::DatabaseOptions;
use serde::Deserialize;

/// Database file used when neither the CLI nor the config file names one.
pub const DEFAULT_DB_PATH: &str = "download_stats.db";

/// Ranking size used when neither the CLI nor the config file names one.
pub const DEFAULT_LIMIT: u32 = 10;

/// TOML file configuration for CLI defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Statistics database path.
    pub db_path: Option<PathBuf>,
    /// Optional database pool max connections (1..=20).
    pub db_max_connections: Option<u32>,
    /// Optional database busy timeout in milliseconds.
    pub db_busy_timeout_ms: Option<u32>,
    /// Counting flag used until one is saved through `settings`.
    pub count_downloads: Option<bool>,
    /// Default number of ranked rows (1..=1000).
    pub default_limit: Option<u32>,
    /// Root directory that `private://` and `public://` URIs resolve under.
    pub files_root: Option<PathBuf>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(value) = self.db_max_connections
            && !(1..=20).contains(&value)
        {
            bail!("Invalid config value for `db_max_connections`: {value}. Expected range: 1..=20");
        }

        if let Some(value) = self.db_busy_timeout_ms
            && value > 120_000
        {
            bail!("Invalid config value for `db_busy_timeout_ms`: {value}. Expected range: 0..=120000");
        }

        if let Some(value) = self.default_limit
            && !(1..=1000).contains(&value)
        {
            bail!("Invalid config value for `default_limit`: {value}. Expected range: 1..=1000");
        }

        Ok(())
    }

    /// Pool options with file overrides applied.
    #[must_use]
    pub fn db_options(&self) -> DatabaseOptions {
        let mut options = DatabaseOptions::default();
        if let Some(n) = self.db_max_connections {
            options.max_connections = n;
        }
        if let Some(ms) = self.db_busy_timeout_ms {
            options.busy_timeout_ms = ms;
        }
        options
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/download-counter/config.toml`
/// 2. `$HOME/.config/download-counter/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("download-counter")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("download-counter")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from `explicit` when given, else from the default path if present.
pub fn load_file_config_or_default(explicit: Option<&Path>) -> Result<FileConfig> {
    if let Some(path) = explicit {
        return load_file_config(path);
    }

    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path),
        _ => Ok(FileConfig::default()),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let cfg: FileConfig = toml::from_str(raw)?;
    cfg.validate()?;
    Ok(cfg)
}
