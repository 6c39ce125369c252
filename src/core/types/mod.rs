//! Core type definitions for memory-probe
//!
//! This module contains the address wrapper, the region snapshot model, the
//! tagged match records produced by scans, process/module descriptions and
//! the error types.

mod address;
mod error;
mod matches;
mod process_info;
mod region;

pub use address::Address;
pub use error::{ErrorKind, MemoryError, MemoryResult, OsErrorCode};
pub use matches::{Match, NumericMatch, NumericType, PatternMatch, PointerChain, PointerResult};
pub use process_info::{ModuleInfo, ProcessArchitecture, ProcessInfo};
pub use region::{MemoryRegion, Protection, RegionState, RegionType};

// Common type aliases
pub type ProcessId = u32;
pub type Size = u64;
