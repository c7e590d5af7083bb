//! Configuration for rustible-elbv2
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/rustible-elbv2/config.toml)
//! - User configuration (~/.rustible-elbv2.toml)
//! - Project configuration (./rustible-elbv2.toml)
//! - Environment variables
//!
//! Configuration only supplies defaults: a module parameter set by the caller
//! always wins over the value configured here.

use crate::modules::ModuleParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// AWS client settings
    pub aws: AwsConfig,

    /// Default module parameters
    pub defaults: Defaults,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// AWS client settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// Region used when the module parameters do not name one
    pub region: Option<String>,

    /// Custom endpoint, e.g. a local ELBv2 emulator
    pub endpoint_url: Option<String>,
}

/// Default module parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Delete live rules that are not declared
    pub purge_rules: Option<bool>,

    /// Delete live listeners on ports that are not declared
    pub purge_listeners: Option<bool>,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log filter used when neither `-v` nor `RUST_LOG` is given
    pub level: Option<String>,

    /// Log format
    pub format: Option<LogFormat>,
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
        }

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                tracing::debug!("Loading config from {}", path.display());
                config = config.merge_from_file(&path)?;
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Get the list of configuration file paths to check, lowest precedence first
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        if let Some(path) = explicit_path {
            return vec![path.clone()];
        }

        let mut paths = vec![PathBuf::from("/etc/rustible-elbv2/config.toml")];

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".rustible-elbv2.toml"));
        }

        paths.push(PathBuf::from("rustible-elbv2.toml"));

        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let file_config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        Ok(self.merge(file_config))
    }

    /// Merge another config into this one, values set in `other` win
    fn merge(&self, other: Config) -> Config {
        Config {
            aws: AwsConfig {
                region: other.aws.region.or_else(|| self.aws.region.clone()),
                endpoint_url: other
                    .aws
                    .endpoint_url
                    .or_else(|| self.aws.endpoint_url.clone()),
            },
            defaults: Defaults {
                purge_rules: other.defaults.purge_rules.or(self.defaults.purge_rules),
                purge_listeners: other
                    .defaults
                    .purge_listeners
                    .or(self.defaults.purge_listeners),
            },
            logging: LoggingConfig {
                level: other.logging.level.or_else(|| self.logging.level.clone()),
                format: other.logging.format.or(self.logging.format),
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // AWS_REGION wins over AWS_DEFAULT_REGION, as in the AWS CLI
        if let Some(region) = lookup("AWS_REGION").or_else(|| lookup("AWS_DEFAULT_REGION")) {
            self.aws.region = Some(region);
        }

        if let Some(url) = lookup("RUSTIBLE_ELBV2_ENDPOINT_URL") {
            self.aws.endpoint_url = Some(url);
        }

        if let Some(purge) = lookup("RUSTIBLE_ELBV2_PURGE_RULES").and_then(|v| parse_bool(&v)) {
            self.defaults.purge_rules = Some(purge);
        }

        if let Some(purge) =
            lookup("RUSTIBLE_ELBV2_PURGE_LISTENERS").and_then(|v| parse_bool(&v))
        {
            self.defaults.purge_listeners = Some(purge);
        }

        if let Some(format) = lookup("RUSTIBLE_ELBV2_LOG_FORMAT").and_then(|v| v.parse().ok()) {
            self.logging.format = Some(format);
        }
    }

    /// Fill module parameters the caller left unset
    pub fn apply_to_params(&self, params: &mut ModuleParams) {
        let mut fill = |key: &str, value: Option<serde_json::Value>| {
            if let Some(value) = value {
                let unset = params.get(key).map_or(true, serde_json::Value::is_null);
                if unset {
                    params.insert(key.to_string(), value);
                }
            }
        };

        fill("region", self.aws.region.clone().map(serde_json::Value::from));
        fill(
            "endpoint_url",
            self.aws.endpoint_url.clone().map(serde_json::Value::from),
        );
        fill(
            "purge_rules",
            self.defaults.purge_rules.map(serde_json::Value::from),
        );
        fill(
            "purge_listeners",
            self.defaults.purge_listeners.map(serde_json::Value::from),
        );
    }

    /// Effective log format
    pub fn log_format(&self) -> LogFormat {
        self.logging.format.unwrap_or_default()
    }

    /// Load from a specific file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Config::default().merge_from_file(path.as_ref())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}
