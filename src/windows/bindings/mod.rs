//! Windows API bindings
//!
//! Thin, checked wrappers over kernel32 and psapi.

pub mod kernel32;
pub mod psapi;
