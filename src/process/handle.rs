//! OS-backed process handle

use crate::core::types::{
    Address, MemoryError, MemoryRegion, MemoryResult, ModuleInfo, ProcessArchitecture, ProcessId,
    Protection,
};
use crate::memory::MemorySource;
use crate::windows::bindings::{kernel32, psapi};
use crate::windows::types::{region_from_basic_info, Handle};
use std::fmt;
use tracing::debug;

/// Process access rights
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessAccess(u32);

impl ProcessAccess {
    pub const ALL_ACCESS: ProcessAccess = ProcessAccess(0x1F_FFFF);
    pub const QUERY_INFORMATION: ProcessAccess = ProcessAccess(0x0400);
    pub const VM_OPERATION: ProcessAccess = ProcessAccess(0x0008);
    pub const VM_READ: ProcessAccess = ProcessAccess(0x0010);
    pub const VM_WRITE: ProcessAccess = ProcessAccess(0x0020);

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn combine(rights: &[ProcessAccess]) -> ProcessAccess {
        ProcessAccess(rights.iter().fold(0, |acc, r| acc | r.0))
    }
}

/// Open handle to a live process, serving as its [`MemorySource`]
///
/// Every query goes straight to the OS; the region map and module list are
/// never cached here.
pub struct ProcessHandle {
    handle: Handle,
    pid: ProcessId,
    access: ProcessAccess,
    architecture: ProcessArchitecture,
}

impl ProcessHandle {
    /// Opens a process with the given rights
    pub fn open(pid: ProcessId, access: ProcessAccess) -> MemoryResult<Self> {
        let handle = kernel32::open_process(pid, access.value())?;
        let architecture = detect_architecture(&handle);
        debug!("Opened PID {} as {:?} with access {:#X}", pid, architecture, access.value());

        Ok(ProcessHandle {
            handle,
            pid,
            access,
            architecture,
        })
    }

    /// Opens a process with every access right
    pub fn open_all_access(pid: ProcessId) -> MemoryResult<Self> {
        Self::open(pid, ProcessAccess::ALL_ACCESS)
    }

    /// Opens a process for inspection only
    pub fn open_for_read(pid: ProcessId) -> MemoryResult<Self> {
        Self::open(
            pid,
            ProcessAccess::combine(&[ProcessAccess::QUERY_INFORMATION, ProcessAccess::VM_READ]),
        )
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn access(&self) -> ProcessAccess {
        self.access
    }

    pub fn architecture(&self) -> ProcessArchitecture {
        self.architecture
    }

    fn ensure_valid(&self) -> MemoryResult<()> {
        if self.handle.is_invalid() {
            Err(MemoryError::InvalidHandle(format!(
                "handle for PID {} is null",
                self.pid
            )))
        } else {
            Ok(())
        }
    }
}

/// A WoW64 target runs with 4-byte pointers even under a 64-bit engine
fn detect_architecture(handle: &Handle) -> ProcessArchitecture {
    match kernel32::is_wow64_process(handle) {
        Ok(true) => ProcessArchitecture::X86,
        Ok(false) => ProcessArchitecture::host(),
        Err(e) => {
            debug!("Architecture probe failed, assuming host: {}", e);
            ProcessArchitecture::host()
        }
    }
}

impl MemorySource for ProcessHandle {
    fn is_alive(&self) -> bool {
        !self.handle.is_invalid()
            && matches!(kernel32::exit_code(&self.handle), Ok(kernel32::STILL_ACTIVE))
    }

    fn query(&self, address: Address) -> MemoryResult<MemoryRegion> {
        self.ensure_valid()?;
        let mbi = kernel32::virtual_query_ex(&self.handle, address)?;
        Ok(region_from_basic_info(&mbi))
    }

    fn read_raw(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize> {
        self.ensure_valid()?;
        kernel32::read_process_memory(&self.handle, address, buffer)
    }

    fn write_raw(&self, address: Address, data: &[u8]) -> MemoryResult<usize> {
        self.ensure_valid()?;
        kernel32::write_process_memory(&self.handle, address, data)
    }

    fn protect(&self, address: Address, size: usize, protection: Protection) -> MemoryResult<Protection> {
        self.ensure_valid()?;
        kernel32::virtual_protect_ex(&self.handle, address, size, protection)
    }

    fn modules(&self) -> MemoryResult<Vec<ModuleInfo>> {
        self.ensure_valid()?;
        psapi::loaded_modules(&self.handle)
    }

    fn pointer_size(&self) -> usize {
        self.architecture.pointer_size()
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("valid", &!self.handle.is_invalid())
            .field("access", &format!("0x{:X}", self.access.value()))
            .field("architecture", &self.architecture)
            .finish()
    }
}
