//! Virtual-memory region catalogue of the target
//!
//! Regions are re-queried on every call. The target may remap at any time, so
//! nothing returned here is cached between scans.

pub mod enumerator;
pub mod filter;
pub mod protection;

pub use enumerator::{
    enumerate_regions, is_executable_address, is_valid_address, is_valid_code_address,
    is_writable_address, module_regions, region_for, RegionWalker,
};
pub use filter::RegionFilter;
pub use protection::ProtectionGuard;
