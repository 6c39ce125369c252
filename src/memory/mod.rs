//! Memory access, region cataloguing and scanning
//!
//! Everything here works against the [`MemorySource`] seam: a live OS process
//! handle on Windows, or the synthetic [`mock::MockProcess`] in tests.
//! - [`access`] validates ranges and performs bounded reads/writes
//! - [`regions`] walks the target's virtual address space
//! - [`limits`] caps per-region reads and total result counts
//! - [`scanner`] runs the matcher battery over region buffers

pub mod access;
pub mod limits;
#[doc(hidden)]
pub mod mock;
pub mod regions;
pub mod scanner;

pub use access::{is_accessible, validate_range, Transfer};
pub use limits::{ResultSink, ScanLimits};
pub use regions::{enumerate_regions, region_for, ProtectionGuard, RegionFilter};
pub use scanner::{CancelToken, MemoryScanner, ScanKind, ScanOptions, ScanOutcome, ScanRequest};

use crate::core::types::{Address, MemoryRegion, MemoryResult, ModuleInfo, Protection};

/// Raw view of a target address space
///
/// Implementations issue a fresh OS query on every call; nothing here caches.
/// Higher layers never call `read_raw`/`write_raw` directly, they go through
/// [`access`] which validates the range first.
pub trait MemorySource: Send + Sync {
    /// False once the handle is invalid or the target has exited
    fn is_alive(&self) -> bool;

    /// Describes the region containing `address`, free regions included.
    ///
    /// Fails once `address` is past the end of the user address space.
    fn query(&self, address: Address) -> MemoryResult<MemoryRegion>;

    /// Copies target bytes into `buffer`, returning how many were transferred
    fn read_raw(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize>;

    /// Copies `data` into the target, returning how many bytes were transferred
    fn write_raw(&self, address: Address, data: &[u8]) -> MemoryResult<usize>;

    /// Changes page protection over a range, returning the previous protection
    fn protect(&self, address: Address, size: usize, protection: Protection) -> MemoryResult<Protection>;

    /// Modules currently loaded in the target
    fn modules(&self) -> MemoryResult<Vec<ModuleInfo>> {
        Ok(Vec::new())
    }

    /// Width of a pointer slot in the target, in bytes
    fn pointer_size(&self) -> usize {
        std::mem::size_of::<usize>()
    }
}
