//! Tagged match records produced by scans

use super::address::Address;
use serde::{Deserialize, Serialize};

/// Data type of a numeric scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericType {
    Int32,
    Int64,
    Float,
    Double,
}

impl NumericType {
    /// Width of the type in bytes
    pub const fn size(&self) -> usize {
        match self {
            NumericType::Int32 | NumericType::Float => 4,
            NumericType::Int64 | NumericType::Double => 8,
        }
    }
}

/// Byte-level hit (pattern, string, regex, opcode)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub address: Address,
    pub size: usize,
    pub bytes: Vec<u8>,
}

impl PatternMatch {
    /// Builds a match whose size is taken from the captured bytes
    pub fn new(address: Address, bytes: &[u8]) -> Self {
        PatternMatch {
            address,
            size: bytes.len(),
            bytes: bytes.to_vec(),
        }
    }
}

/// Numeric hit with the raw little-endian bytes that matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericMatch {
    pub address: Address,
    pub data_type: NumericType,
    pub bytes: Vec<u8>,
}

impl NumericMatch {
    /// Decodes the stored bytes as a float, when the type is floating point
    pub fn as_f64(&self) -> Option<f64> {
        match self.data_type {
            NumericType::Float => Some(f32::from_le_bytes(self.bytes.as_slice().try_into().ok()?) as f64),
            NumericType::Double => Some(f64::from_le_bytes(self.bytes.as_slice().try_into().ok()?)),
            _ => None,
        }
    }

    /// Decodes the stored bytes as an integer, when the type is integral
    pub fn as_i64(&self) -> Option<i64> {
        match self.data_type {
            NumericType::Int32 => Some(i32::from_le_bytes(self.bytes.as_slice().try_into().ok()?) as i64),
            NumericType::Int64 => Some(i64::from_le_bytes(self.bytes.as_slice().try_into().ok()?)),
            _ => None,
        }
    }
}

/// A slot at `address` holding the value `points_to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointerResult {
    pub address: Address,
    pub points_to: Address,
    pub offset: u64,
}

/// Ordered links from a base address to a final target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerChain {
    pub links: Vec<PointerResult>,
}

impl PointerChain {
    /// Address reached by the last link, if any
    pub fn target(&self) -> Option<Address> {
        self.links
            .last()
            .map(|link| link.points_to.offset(link.offset as i64))
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Any scan hit, tagged by matcher family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Match {
    Pattern(PatternMatch),
    Numeric(NumericMatch),
    Pointer(PointerResult),
}

impl Match {
    /// Absolute address of the hit
    pub fn address(&self) -> Address {
        match self {
            Match::Pattern(m) => m.address,
            Match::Numeric(m) => m.address,
            Match::Pointer(m) => m.address,
        }
    }
}

impl From<PatternMatch> for Match {
    fn from(m: PatternMatch) -> Self {
        Match::Pattern(m)
    }
}

impl From<NumericMatch> for Match {
    fn from(m: NumericMatch) -> Self {
        Match::Numeric(m)
    }
}

impl From<PointerResult> for Match {
    fn from(m: PointerResult) -> Self {
        Match::Pointer(m)
    }
}
