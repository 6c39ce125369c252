//! Windows-specific types

pub mod handle;
pub mod memory_info;

pub use handle::Handle;
pub use memory_info::region_from_basic_info;
