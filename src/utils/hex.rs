//! Hex string and byte conversions

use crate::core::types::{MemoryError, MemoryResult};

/// Renders bytes as space-separated upper-case pairs, e.g. `"48 8B 05"`
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses hex text, with or without whitespace between pairs
pub fn hex_to_bytes(text: &str) -> MemoryResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let compact = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(&compact);

    hex::decode(compact).map_err(|e| MemoryError::InvalidPattern(format!("Invalid hex '{text}': {e}")))
}
