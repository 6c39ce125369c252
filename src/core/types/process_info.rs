//! Process and module descriptions

use super::{Address, ProcessId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Entry of the system process list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: ProcessId,
    pub name: String,
    pub parent_pid: Option<ProcessId>,
    pub thread_count: u32,
}

impl ProcessInfo {
    /// Creates a new ProcessInfo with minimal information
    pub fn new(pid: ProcessId, name: impl Into<String>) -> Self {
        ProcessInfo {
            pid,
            name: name.into(),
            parent_pid: None,
            thread_count: 0,
        }
    }

    /// Checks if this is the idle or system process
    pub fn is_system_process(&self) -> bool {
        self.pid == 0 || self.pid == 4
    }
}

/// Process architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessArchitecture {
    X86,
    X64,
}

impl ProcessArchitecture {
    /// Architecture of the running engine
    pub fn host() -> Self {
        if cfg!(target_pointer_width = "64") {
            ProcessArchitecture::X64
        } else {
            ProcessArchitecture::X86
        }
    }

    /// Width of a pointer slot in bytes
    pub fn pointer_size(&self) -> usize {
        match self {
            ProcessArchitecture::X86 => 4,
            ProcessArchitecture::X64 => 8,
        }
    }
}

/// A module loaded in the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub path: PathBuf,
    pub base_address: Address,
    pub size: u64,
}

impl ModuleInfo {
    /// Creates a new ModuleInfo
    pub fn new(name: impl Into<String>, base_address: Address, size: u64) -> Self {
        ModuleInfo {
            name: name.into(),
            path: PathBuf::new(),
            base_address,
            size,
        }
    }

    /// Gets the end address of the module
    pub fn end_address(&self) -> Address {
        self.base_address.add(self.size)
    }

    /// Checks if an address is within this module
    pub fn contains_address(&self, address: Address) -> bool {
        address >= self.base_address && address < self.end_address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_bounds() {
        let module = ModuleInfo::new("game.exe", Address::new(0x400000), 0x1000);
        assert_eq!(module.end_address(), Address::new(0x401000));
        assert!(module.contains_address(Address::new(0x400FFF)));
        assert!(!module.contains_address(Address::new(0x401000)));
    }

    #[test]
    fn test_system_process() {
        assert!(ProcessInfo::new(4, "System").is_system_process());
        assert!(!ProcessInfo::new(1234, "game.exe").is_system_process());
    }

    #[test]
    fn test_pointer_size() {
        assert_eq!(ProcessArchitecture::X86.pointer_size(), 4);
        assert_eq!(ProcessArchitecture::X64.pointer_size(), 8);
    }
}
