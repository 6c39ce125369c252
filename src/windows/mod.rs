//! Windows API layer for memory manipulation
//!
//! Provides safe wrappers around the Win32 calls the process backend needs.
//! All unsafe FFI calls are contained within this module; failures carry the
//! thread's last error code so the message can be resolved on display.

pub mod bindings;
pub mod types;
pub mod utils;

pub use types::Handle;
pub use utils::{format_error_message, last_error_code};

pub use bindings::{kernel32, psapi};
