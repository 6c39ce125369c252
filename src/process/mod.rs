//! Process attachment and OS process access
//!
//! [`ProcessManager`] is platform independent and works over any
//! [`MemorySource`](crate::memory::MemorySource). On Windows this module also
//! provides the OS-backed [`ProcessHandle`], process enumeration and debug
//! privilege elevation.

#[cfg(windows)]
pub mod enumerator;
#[cfg(windows)]
pub mod handle;
pub mod manager;
#[cfg(windows)]
pub mod privileges;

#[cfg(windows)]
pub use enumerator::{enumerate_processes, find_process_by_name, ProcessEnumerator};
#[cfg(windows)]
pub use handle::{ProcessAccess, ProcessHandle};
pub use manager::{AttachedProcess, ProcessManager};
#[cfg(windows)]
pub use privileges::{enable_debug_privilege, has_debug_privilege};
