//! Configuration validator for memory-probe
//!
//! Validates configuration values to ensure they are within acceptable ranges.

use super::loader::{Config, ConfigError, LoggingConfig, ScannerConfig};
use tracing_subscriber::EnvFilter;

/// Hard ceiling on scan worker threads
const MAX_THREADS: usize = 128;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the entire configuration
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_scanner(&config.scanner)?;
        Self::validate_logging(&config.logging)?;
        Ok(())
    }

    fn validate_scanner(scanner: &ScannerConfig) -> Result<(), ConfigError> {
        if scanner.max_region_size == 0 {
            return Err(ConfigError::Invalid(
                "Maximum region size must be greater than 0".to_string(),
            ));
        }

        if scanner.max_results == 0 {
            return Err(ConfigError::Invalid(
                "Maximum results must be at least 1".to_string(),
            ));
        }

        if scanner.max_threads == 0 || scanner.max_threads > MAX_THREADS {
            return Err(ConfigError::Invalid(format!(
                "Scanner threads must be between 1 and {}",
                MAX_THREADS
            )));
        }

        if scanner.max_chain_frontier == 0 {
            return Err(ConfigError::Invalid(
                "Pointer chain frontier must be at least 1".to_string(),
            ));
        }

        if scanner.max_pointer_depth == 0 {
            return Err(ConfigError::Invalid(
                "Maximum pointer depth must be at least 1".to_string(),
            ));
        }

        if !scanner.float_tolerance.is_finite() || scanner.float_tolerance < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "Float tolerance must be a finite, non-negative number, got {}",
                scanner.float_tolerance
            )));
        }

        Ok(())
    }

    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        EnvFilter::try_new(&logging.level).map_err(|e| {
            ConfigError::Invalid(format!("Invalid log level '{}': {}", logging.level, e))
        })?;
        Ok(())
    }
}

/// Validates a configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    ConfigValidator::validate(config)
}
