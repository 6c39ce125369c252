//! Configuration loader for memory-probe
//!
//! Handles loading configuration from TOML files and merging with defaults.

use super::defaults::default_config;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File looked up in the working directory by [`load_config`]
pub const DEFAULT_CONFIG_FILE: &str = "memory-probe.toml";

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_scanner")]
    pub scanner: ScannerConfig,

    #[serde(default = "default_process")]
    pub process: ProcessConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

/// Scanner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Regions larger than this are read only up to this many bytes
    #[serde(default = "default_max_region_size")]
    pub max_region_size: u64,
    /// Result cap shared by all regions of one request
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Scan regions on a worker pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
    /// Addresses re-scanned per pointer-chain depth
    #[serde(default = "default_max_chain_frontier")]
    pub max_chain_frontier: usize,
    #[serde(default = "default_max_pointer_depth")]
    pub max_pointer_depth: usize,
    /// Used by float requests that carry no tolerance
    #[serde(default = "default_float_tolerance")]
    pub float_tolerance: f64,
}

/// Process layer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Request SeDebugPrivilege before opening a target
    #[serde(default = "default_enable_debug_privilege")]
    pub enable_debug_privilege: bool,
    /// Lift page protection around writes and restore it afterwards
    #[serde(default = "default_restore_protection")]
    pub restore_protection: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `memory_probe=debug`
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Configuration loader
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ConfigLoader {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Loads configuration from file
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            return Err(ConfigError::FileNotFound(
                self.config_path.display().to_string(),
            ));
        }

        let contents = fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Loads configuration, falling back to defaults only when the file is missing
    pub fn load_or_default(&self) -> Result<Config, ConfigError> {
        match self.load() {
            Err(ConfigError::FileNotFound(_)) => Ok(Config::default()),
            other => other,
        }
    }

    /// Saves configuration to file
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Loads and validates configuration from the default location
pub fn load_config() -> Result<Config, ConfigError> {
    let config = ConfigLoader::new(DEFAULT_CONFIG_FILE).load_or_default()?;
    super::validate_config(&config)?;
    Ok(config)
}

// Default functions for serde
fn default_scanner() -> ScannerConfig {
    let defaults = default_config().scanner;
    ScannerConfig {
        max_region_size: defaults.max_region_size,
        max_results: defaults.max_results,
        parallel: defaults.parallel,
        max_threads: defaults.max_threads,
        max_chain_frontier: defaults.max_chain_frontier,
        max_pointer_depth: defaults.max_pointer_depth,
        float_tolerance: defaults.float_tolerance,
    }
}

fn default_process() -> ProcessConfig {
    let defaults = default_config().process;
    ProcessConfig {
        enable_debug_privilege: defaults.enable_debug_privilege,
        restore_protection: defaults.restore_protection,
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_config().logging.level,
    }
}

// Individual field defaults
fn default_max_region_size() -> u64 {
    default_config().scanner.max_region_size
}

fn default_max_results() -> usize {
    default_config().scanner.max_results
}

fn default_parallel() -> bool {
    default_config().scanner.parallel
}

fn default_max_threads() -> usize {
    default_config().scanner.max_threads
}

fn default_max_chain_frontier() -> usize {
    default_config().scanner.max_chain_frontier
}

fn default_max_pointer_depth() -> usize {
    default_config().scanner.max_pointer_depth
}

fn default_float_tolerance() -> f64 {
    default_config().scanner.float_tolerance
}

fn default_enable_debug_privilege() -> bool {
    default_config().process.enable_debug_privilege
}

fn default_restore_protection() -> bool {
    default_config().process.restore_protection
}

fn default_log_level() -> String {
    default_config().logging.level
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scanner: default_scanner(),
            process: default_process(),
            logging: default_logging(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        default_scanner()
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        default_process()
    }
}
