//! Target-process address wrapper with hex parsing
//!
//! Addresses are always carried as 64-bit values, including for 32-bit
//! targets, so callers see one representation regardless of target width.

use super::error::{MemoryError, MemoryResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An absolute address inside the attached process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub u64);

impl Address {
    /// Creates a new address from a raw value
    pub const fn new(value: u64) -> Self {
        Address(value)
    }

    /// Creates a null address (0x0)
    pub const fn null() -> Self {
        Address(0)
    }

    /// Checks if the address is null
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the address is aligned to the specified boundary
    pub const fn is_aligned(&self, alignment: u64) -> bool {
        alignment != 0 && self.0 % alignment == 0
    }

    /// Aligns the address down to the specified power-of-two boundary
    pub const fn align_down(&self, alignment: u64) -> Self {
        if alignment == 0 {
            return *self;
        }
        Address(self.0 & !(alignment - 1))
    }

    /// Aligns the address up to the specified power-of-two boundary
    pub const fn align_up(&self, alignment: u64) -> Self {
        if alignment == 0 {
            return *self;
        }
        Address(self.0.wrapping_add(alignment - 1) & !(alignment - 1))
    }

    /// Moves the address by a signed offset, wrapping at the ends of the space
    pub const fn offset(&self, offset: i64) -> Self {
        Address(self.0.wrapping_add_signed(offset))
    }

    /// Adds an unsigned byte count, saturating at the top of the space
    pub const fn add(&self, bytes: u64) -> Self {
        Address(self.0.saturating_add(bytes))
    }

    /// Returns the raw value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the distance from `other` to `self`, or `None` if `other` lies above
    pub const fn distance_from(&self, other: Address) -> Option<u64> {
        self.0.checked_sub(other.0)
    }

    /// Parses a text address, rejecting the null address
    pub fn parse_non_null(s: &str) -> MemoryResult<Self> {
        let address: Address = s.parse()?;
        if address.is_null() {
            return Err(MemoryError::invalid_address(format!("null address: {s}"), None));
        }
        Ok(address)
    }
}

impl FromStr for Address {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let value = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            u64::from_str_radix(hex, 16)
        } else if let Some(hex) = s.strip_prefix('$') {
            u64::from_str_radix(hex, 16)
        } else if s.chars().any(|c| c.is_ascii_alphabetic()) {
            // Letters only make sense as hex digits
            u64::from_str_radix(s, 16)
        } else {
            s.parse::<u64>()
        };

        value
            .map(Address::new)
            .map_err(|_| MemoryError::invalid_address(s, None))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::UpperHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Address::new(value)
    }
}

impl From<usize> for Address {
    fn from(value: usize) -> Self {
        Address::new(value as u64)
    }
}

impl From<Address> for u64 {
    fn from(address: Address) -> Self {
        address.0
    }
}
