//! memory-probe: attach to a process, catalogue its memory and scan it
//!
//! The engine core (`core`, `memory`, `utils`, `config` and the
//! [`ProcessManager`]) is platform independent and talks to targets through
//! the [`MemorySource`] trait. The Windows backend in `process` and `windows`
//! supplies the live implementation.

pub mod config;
pub mod core;
pub mod memory;
pub mod process;
pub mod utils;
#[cfg(windows)]
pub mod windows;

pub use crate::core::types::{
    Address, ErrorKind, Match, MemoryError, MemoryRegion, MemoryResult, ModuleInfo,
    NumericMatch, PatternMatch, PointerResult, ProcessId, ProcessInfo, Protection,
};
pub use crate::core::{AUTHORS, VERSION};
pub use config::Config;
pub use memory::{CancelToken, MemoryScanner, MemorySource, RegionFilter, ScanKind, ScanOptions, ScanOutcome, ScanRequest};
pub use process::ProcessManager;
