//! Core module containing the fundamental types of the engine
//!
//! Addresses, memory regions, match records, process descriptions and the
//! error taxonomy live here. Nothing in this module touches the OS.

pub mod types;

pub use types::{
    Address, ErrorKind, Match, MemoryError, MemoryRegion, MemoryResult, ModuleInfo,
    NumericMatch, NumericType, OsErrorCode, PatternMatch, PointerChain, PointerResult,
    ProcessArchitecture, ProcessId, ProcessInfo, Protection, RegionState, RegionType,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
