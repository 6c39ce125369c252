//! Virtual-memory region snapshot model
//!
//! Protection, state and type values use the Windows encodings on every
//! platform so that synthetic layouts and live queries share one model.

use super::address::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Page protection flags of a region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Protection(pub u32);

impl Protection {
    pub const NOACCESS: Protection = Protection(0x01);
    pub const READONLY: Protection = Protection(0x02);
    pub const READWRITE: Protection = Protection(0x04);
    pub const WRITECOPY: Protection = Protection(0x08);
    pub const EXECUTE: Protection = Protection(0x10);
    pub const EXECUTE_READ: Protection = Protection(0x20);
    pub const EXECUTE_READWRITE: Protection = Protection(0x40);
    pub const EXECUTE_WRITECOPY: Protection = Protection(0x80);
    pub const GUARD: Protection = Protection(0x100);
    pub const NOCACHE: Protection = Protection(0x200);
    pub const WRITECOMBINE: Protection = Protection(0x400);

    const WRITABLE_MASK: u32 = 0x04 | 0x08 | 0x40 | 0x80;
    const EXECUTABLE_MASK: u32 = 0x10 | 0x20 | 0x40 | 0x80;

    /// Returns the raw protection value
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Checks whether every bit of `other` is set
    pub const fn contains(&self, other: Protection) -> bool {
        self.0 & other.0 == other.0
    }

    /// Combines two protection values
    pub const fn with(self, other: Protection) -> Protection {
        Protection(self.0 | other.0)
    }

    /// Check if guard page flag is set
    pub const fn is_guarded(&self) -> bool {
        self.0 & Self::GUARD.0 != 0
    }

    /// Check if the no-access flag is set
    pub const fn is_no_access(&self) -> bool {
        self.0 & Self::NOACCESS.0 != 0
    }

    /// True when pages may be touched without faulting
    pub const fn is_accessible(&self) -> bool {
        self.0 != 0 && !self.is_guarded() && !self.is_no_access()
    }

    /// Check if protection allows writing
    pub const fn is_writable(&self) -> bool {
        self.0 & Self::WRITABLE_MASK != 0
    }

    /// Check if protection allows execution
    pub const fn is_executable(&self) -> bool {
        self.0 & Self::EXECUTABLE_MASK != 0
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Protection, &str); 11] = [
            (Protection::NOACCESS, "PAGE_NOACCESS"),
            (Protection::READONLY, "PAGE_READONLY"),
            (Protection::READWRITE, "PAGE_READWRITE"),
            (Protection::WRITECOPY, "PAGE_WRITECOPY"),
            (Protection::EXECUTE, "PAGE_EXECUTE"),
            (Protection::EXECUTE_READ, "PAGE_EXECUTE_READ"),
            (Protection::EXECUTE_READWRITE, "PAGE_EXECUTE_READWRITE"),
            (Protection::EXECUTE_WRITECOPY, "PAGE_EXECUTE_WRITECOPY"),
            (Protection::GUARD, "PAGE_GUARD"),
            (Protection::NOCACHE, "PAGE_NOCACHE"),
            (Protection::WRITECOMBINE, "PAGE_WRITECOMBINE"),
        ];

        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();

        if names.is_empty() {
            write!(f, "0x{:X}", self.0)
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

/// Allocation state of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionState {
    Committed,
    Reserved,
    Free,
}

impl RegionState {
    pub const MEM_COMMIT: u32 = 0x1000;
    pub const MEM_RESERVE: u32 = 0x2000;
    pub const MEM_FREE: u32 = 0x10000;

    /// Maps the OS state value
    pub fn from_raw(value: u32) -> Self {
        match value {
            Self::MEM_COMMIT => RegionState::Committed,
            Self::MEM_RESERVE => RegionState::Reserved,
            _ => RegionState::Free,
        }
    }
}

/// Backing type of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionType {
    Private,
    Mapped,
    Image,
    Unknown,
}

impl RegionType {
    pub const MEM_PRIVATE: u32 = 0x20000;
    pub const MEM_MAPPED: u32 = 0x40000;
    pub const MEM_IMAGE: u32 = 0x1000000;

    /// Maps the OS type value
    pub fn from_raw(value: u32) -> Self {
        match value {
            Self::MEM_PRIVATE => RegionType::Private,
            Self::MEM_MAPPED => RegionType::Mapped,
            Self::MEM_IMAGE => RegionType::Image,
            _ => RegionType::Unknown,
        }
    }
}

/// Snapshot of one contiguous mapping in the target
///
/// Stale as soon as the target changes its address map; never cache it
/// across scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    pub base_address: Address,
    pub size: u64,
    pub protection: Protection,
    pub state: RegionState,
    pub region_type: RegionType,
    /// Owning module, best effort
    pub module_name: Option<String>,
}

impl MemoryRegion {
    /// Creates a committed private region
    pub fn new(base_address: Address, size: u64, protection: Protection) -> Self {
        MemoryRegion {
            base_address,
            size,
            protection,
            state: RegionState::Committed,
            region_type: RegionType::Private,
            module_name: None,
        }
    }

    /// Exclusive end of the region
    pub fn end_address(&self) -> Address {
        self.base_address.add(self.size)
    }

    /// Check if an address is within this region
    pub fn contains(&self, address: Address) -> bool {
        address >= self.base_address && address < self.end_address()
    }

    /// Check if `[address, address + size)` lies entirely within this region
    pub fn contains_range(&self, address: Address, size: u64) -> bool {
        match address.0.checked_add(size) {
            Some(end) => self.contains(address) && end <= self.end_address().0,
            None => false,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.state == RegionState::Committed
    }

    /// Committed and neither guarded nor no-access
    pub fn is_readable(&self) -> bool {
        self.is_committed() && self.protection.is_accessible()
    }

    pub fn is_writable(&self) -> bool {
        self.is_committed() && self.protection.is_writable()
    }

    pub fn is_executable(&self) -> bool {
        self.is_committed() && self.protection.is_executable()
    }

    pub fn is_guarded(&self) -> bool {
        self.protection.is_guarded()
    }
}
