//! Default configuration values for memory-probe

use crate::memory::limits::{
    DEFAULT_FLOAT_TOLERANCE, DEFAULT_MAX_CHAIN_FRONTIER, DEFAULT_MAX_POINTER_DEPTH,
    DEFAULT_MAX_REGION_SIZE, DEFAULT_MAX_RESULTS,
};
use serde::{Deserialize, Serialize};

/// Default configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDefaults {
    pub scanner: ScannerDefaults,
    pub process: ProcessDefaults,
    pub logging: LoggingDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerDefaults {
    pub max_region_size: u64,
    pub max_results: usize,
    pub parallel: bool,
    pub max_threads: usize,
    pub max_chain_frontier: usize,
    pub max_pointer_depth: usize,
    pub float_tolerance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDefaults {
    pub enable_debug_privilege: bool,
    pub restore_protection: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingDefaults {
    pub level: String,
}

/// Returns the default configuration
pub fn default_config() -> ConfigDefaults {
    ConfigDefaults {
        scanner: ScannerDefaults {
            max_region_size: DEFAULT_MAX_REGION_SIZE,
            max_results: DEFAULT_MAX_RESULTS,
            parallel: false,
            max_threads: num_cpus::get().min(8),
            max_chain_frontier: DEFAULT_MAX_CHAIN_FRONTIER,
            max_pointer_depth: DEFAULT_MAX_POINTER_DEPTH,
            float_tolerance: DEFAULT_FLOAT_TOLERANCE,
        },
        process: ProcessDefaults {
            enable_debug_privilege: true,
            restore_protection: true,
        },
        logging: LoggingDefaults {
            level: "info".to_string(),
        },
    }
}
