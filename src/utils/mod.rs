//! Helpers shared by the engine and its callers
//!
//! Pattern-text parsing, hex conversions, canonical address formatting and
//! the alignment probe.

pub mod format;
pub mod hex;
pub mod pattern;

pub use format::{alignment_of, format_address, MAX_PROBED_ALIGNMENT};
pub use self::hex::{bytes_to_hex, hex_to_bytes};
pub use pattern::{parse_pattern, BytePattern, PatternMatches};
