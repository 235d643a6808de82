//! Configuration for schema generation runs

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "ABI_SCHEMA_";

/// Narrowest fingerprint, in hex characters
pub const MIN_FINGERPRINT_WIDTH: usize = 4;

/// Widest fingerprint: the full Keccak-256 digest
pub const MAX_FINGERPRINT_WIDTH: usize = 64;

/// Main configuration for a generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Schema that qualifies every generated table
    pub schema_name: String,
    /// Treat `schema_name` as an environment variable resolved when the script runs
    pub variable_schema: bool,
    /// Fingerprint length in hex characters
    pub fingerprint_width: usize,
    /// Ceiling on tuple nesting
    pub max_nesting_depth: usize,
    /// Upper bound on migration synthesis, in seconds
    pub engine_timeout_secs: u64,
    /// Descriptive part of the migration file name
    pub migration_name: String,
    /// Output directory for generated artifacts
    pub output_dir: String,
    /// Print artifacts instead of writing them
    pub dry_run: bool,
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
    /// Contracts processed in order
    pub contracts: Vec<ContractSource>,
}

/// One contract ABI to process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSource {
    pub name: String,
    pub abi_path: PathBuf,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            schema_name: "public".to_string(),
            variable_schema: false,
            fingerprint_width: 8,
            max_nesting_depth: 32,
            engine_timeout_secs: 30,
            migration_name: "event_schema".to_string(),
            output_dir: "./generated".to_string(),
            dry_run: false,
            log_level: "info".to_string(),
            contracts: Vec::new(),
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from a `.toml`, `.json`, `.yaml` or `.yml` file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read configuration file {}: {}", path.display(), e))
        })?;

        let config = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| {
                Error::config(format!("Failed to parse TOML configuration file {}: {}", path.display(), e))
            })?,
            Some("json") => serde_json::from_str(&content).map_err(|e| {
                Error::config(format!("Failed to parse JSON configuration file {}: {}", path.display(), e))
            })?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| {
                Error::config(format!("Failed to parse YAML configuration file {}: {}", path.display(), e))
            })?,
            _ => {
                return Err(Error::config(
                    "Unsupported configuration file format. Supported formats: .toml, .json, .yaml, .yml",
                ))
            }
        };

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `ABI_SCHEMA_*` environment variable overrides
    pub fn apply_environment_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    /// Apply overrides from an arbitrary lookup, keyed without the prefix
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(schema_name) = lookup("SCHEMA_NAME") {
            self.schema_name = schema_name;
        }
        if let Some(variable) = lookup("VARIABLE_SCHEMA") {
            self.variable_schema = match variable.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(Error::config(format!(
                        "Invalid {}VARIABLE_SCHEMA value: {}",
                        ENV_PREFIX, variable
                    )))
                }
            };
        }
        if let Some(width) = lookup("FINGERPRINT_WIDTH") {
            self.fingerprint_width = width.parse().map_err(|_| {
                Error::config(format!("Invalid {}FINGERPRINT_WIDTH value: {}", ENV_PREFIX, width))
            })?;
        }
        if let Some(output_dir) = lookup("OUTPUT_DIR") {
            self.output_dir = output_dir;
        }
        if let Some(log_level) = lookup("LOG_LEVEL") {
            self.log_level = log_level;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.schema_name.is_empty() {
            return Err(ConfigError::EmptySchemaName);
        }

        let mut chars = self.schema_name.chars();
        let valid_start = chars.next().map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::InvalidSchemaName {
                name: self.schema_name.clone(),
            });
        }

        if !(MIN_FINGERPRINT_WIDTH..=MAX_FINGERPRINT_WIDTH).contains(&self.fingerprint_width) {
            return Err(ConfigError::InvalidFingerprintWidth {
                width: self.fingerprint_width,
            });
        }

        if self.max_nesting_depth == 0 {
            return Err(ConfigError::InvalidNestingDepth);
        }

        if self.engine_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        if self.migration_name.is_empty()
            || !self
                .migration_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::InvalidMigrationName {
                name: self.migration_name.clone(),
            });
        }

        let mut seen = HashSet::new();
        for contract in &self.contracts {
            if !seen.insert(contract.name.as_str()) {
                return Err(ConfigError::DuplicateContract {
                    name: contract.name.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Schema name must not be empty")]
    EmptySchemaName,
    #[error("Schema name '{name}' is not a valid SQL identifier")]
    InvalidSchemaName { name: String },
    #[error("Fingerprint width {width} is outside 4..=64 hex characters")]
    InvalidFingerprintWidth { width: usize },
    #[error("Maximum nesting depth must be greater than 0")]
    InvalidNestingDepth,
    #[error("Engine timeout must be greater than 0")]
    InvalidTimeout,
    #[error("Migration name '{name}' must be non-empty and use only letters, digits, '_' or '-'")]
    InvalidMigrationName { name: String },
    #[error("Contract '{name}' is listed more than once")]
    DuplicateContract { name: String },
}

#[cfg(test)]
mod tests;
