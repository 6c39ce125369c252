//! Attachment lifecycle and the process-level memory API

use crate::config::Config;
use crate::core::types::{
    Address, MemoryError, MemoryRegion, MemoryResult, ModuleInfo, ProcessId, Protection,
};
use crate::memory::regions::{enumerate_regions, ProtectionGuard, RegionFilter};
use crate::memory::scanner::MemoryScanner;
use crate::memory::{access, MemorySource};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// The one process an engine is attached to
///
/// Shared by reference count: operations clone it out of the manager and run
/// unlocked, so the underlying handle is closed when the last user lets go.
pub struct AttachedProcess {
    pid: ProcessId,
    name: String,
    source: Arc<dyn MemorySource>,
    modules: RwLock<Vec<ModuleInfo>>,
}

impl AttachedProcess {
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &dyn MemorySource {
        self.source.as_ref()
    }

    /// Module table captured at attach time or at the last refresh
    pub fn modules(&self) -> Vec<ModuleInfo> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Owns the attachment and routes reads, writes and scans to it
pub struct ProcessManager {
    config: Config,
    attached: RwLock<Option<Arc<AttachedProcess>>>,
}

impl Default for ProcessManager {
    fn default() -> Self {
        ProcessManager::new(Config::default())
    }
}

impl ProcessManager {
    pub fn new(config: Config) -> Self {
        ProcessManager {
            config,
            attached: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens `pid` with full access, replacing any current attachment
    ///
    /// Debug privilege is requested first when configured; failing to get it
    /// is logged and attachment proceeds with the caller's own rights.
    #[cfg(windows)]
    pub fn attach(&self, pid: ProcessId) -> MemoryResult<()> {
        use crate::process::{enumerator, handle::ProcessHandle};

        self.request_debug_privilege();
        let handle = ProcessHandle::open_all_access(pid)?;
        let name = enumerator::find_process_by_pid(pid)?
            .map(|p| p.name)
            .ok_or_else(|| MemoryError::process_not_found(pid, None))?;
        self.attach_source(pid, name, Arc::new(handle))
    }

    /// Attaches to the first process whose executable name is exactly `name`
    #[cfg(windows)]
    pub fn attach_by_name(&self, name: &str) -> MemoryResult<()> {
        use crate::process::{enumerator, handle::ProcessHandle};

        let process = enumerator::find_process_by_name(name)?
            .ok_or_else(|| MemoryError::process_not_found(name, None))?;
        self.request_debug_privilege();
        let handle = ProcessHandle::open_all_access(process.pid)?;
        self.attach_source(process.pid, process.name, Arc::new(handle))
    }

    #[cfg(windows)]
    fn request_debug_privilege(&self) {
        if !self.config.process.enable_debug_privilege {
            return;
        }
        if let Err(e) = crate::process::privileges::enable_debug_privilege() {
            warn!("Continuing without debug privilege: {}", e);
        }
    }

    /// Attaches to an already opened memory source
    ///
    /// This is the common tail of [`attach`](Self::attach) and the entry
    /// point for non-OS sources.
    pub fn attach_source(
        &self,
        pid: ProcessId,
        name: impl Into<String>,
        source: Arc<dyn MemorySource>,
    ) -> MemoryResult<()> {
        if !source.is_alive() {
            return Err(MemoryError::InvalidHandle(format!(
                "process {} is not running",
                pid
            )));
        }

        let modules = source.modules().unwrap_or_else(|e| {
            warn!("Module table of PID {} unavailable: {}", pid, e);
            Vec::new()
        });
        let process = Arc::new(AttachedProcess {
            pid,
            name: name.into(),
            source,
            modules: RwLock::new(modules),
        });
        info!(
            "Attached to {} (PID {}) with {} modules",
            process.name,
            process.pid,
            process.modules().len()
        );

        let previous = self
            .attached
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(process);
        if let Some(previous) = previous {
            info!("Detached from {} (PID {})", previous.name, previous.pid);
        }
        Ok(())
    }

    /// Releases the attachment; does nothing when unattached
    pub fn detach(&self) {
        let previous = self
            .attached
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            info!("Detached from {} (PID {})", previous.name, previous.pid);
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The current attachment, shared with the caller
    pub fn attached(&self) -> MemoryResult<Arc<AttachedProcess>> {
        self.attached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(MemoryError::ProcessNotAttached)
    }

    pub fn process_id(&self) -> Option<ProcessId> {
        self.attached().ok().map(|p| p.pid)
    }

    pub fn process_name(&self) -> Option<String> {
        self.attached().ok().map(|p| p.name.clone())
    }

    /// Reads exactly `size` bytes; a short read is an error
    pub fn read_memory(&self, address: Address, size: usize) -> MemoryResult<Vec<u8>> {
        let process = self.attached()?;
        access::read_exact(process.source(), address, size)
    }

    /// Writes all of `data`, lifting page protection for the duration
    ///
    /// The range is validated against its current protection first. The
    /// original protection is put back however the write ends.
    pub fn write_memory(&self, address: Address, data: &[u8]) -> MemoryResult<()> {
        let process = self.attached()?;
        let source = process.source();
        access::validate_range(source, address, data.len())?;

        if !self.config.process.restore_protection {
            return access::write_exact(source, address, data);
        }

        let _guard = ProtectionGuard::change(source, address, data.len(), Protection::EXECUTE_READWRITE)?;
        access::write_exact(source, address, data)
    }

    /// True if the range lies inside one committed, accessible region
    pub fn is_accessible(&self, address: Address, size: usize) -> bool {
        self.attached()
            .map(|p| access::is_accessible(p.source(), address, size))
            .unwrap_or(false)
    }

    /// Module whose name equals `name` exactly, case included
    ///
    /// Looks in the table captured at attach time. A module loaded after that
    /// is only found once [`refresh_modules`](Self::refresh_modules) has run.
    pub fn resolve_module(&self, name: &str) -> MemoryResult<ModuleInfo> {
        let process = self.attached()?;
        let modules = process
            .modules
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        modules
            .iter()
            .find(|m| m.name == name)
            .cloned()
            .ok_or_else(|| MemoryError::ModuleNotFound(name.to_string()))
    }

    pub fn module_base(&self, name: &str) -> MemoryResult<Address> {
        Ok(self.resolve_module(name)?.base_address)
    }

    pub fn module_size(&self, name: &str) -> MemoryResult<u64> {
        Ok(self.resolve_module(name)?.size)
    }

    pub fn modules(&self) -> MemoryResult<Vec<ModuleInfo>> {
        Ok(self.attached()?.modules())
    }

    /// Re-reads the module table, returning how many modules are loaded
    pub fn refresh_modules(&self) -> MemoryResult<usize> {
        let process = self.attached()?;
        let modules = process.source().modules()?;
        let count = modules.len();
        *process
            .modules
            .write()
            .unwrap_or_else(PoisonError::into_inner) = modules;
        debug!("Module table of PID {} refreshed: {} modules", process.pid, count);
        Ok(count)
    }

    /// Committed regions of the target passing `filter`
    pub fn regions(&self, filter: &RegionFilter) -> MemoryResult<Vec<MemoryRegion>> {
        let process = self.attached()?;
        enumerate_regions(process.source(), filter)
    }

    /// Scanner bound to the current attachment and the configured limits
    ///
    /// The scanner keeps the target alive by itself, so it stays usable
    /// after a detach or re-attach.
    pub fn scanner(&self) -> MemoryResult<MemoryScanner> {
        let process = self.attached()?;
        MemoryScanner::from_config(process.source.clone(), &self.config.scanner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ErrorKind;
    use crate::memory::mock::MockProcess;

    fn mock() -> Arc<MockProcess> {
        Arc::new(
            MockProcess::builder()
                .zeroed_region(0x400000, 0x2000, Protection::EXECUTE_READ)
                .zeroed_region(0x10000, 0x1000, Protection::READWRITE)
                .module("game.exe", 0x400000, 0x2000)
                .build(),
        )
    }

    #[test]
    fn test_unattached_operations_fail() {
        let manager = ProcessManager::default();
        assert!(!manager.is_attached());
        assert_eq!(manager.process_id(), None);
        for err in [
            manager.read_memory(Address::new(0x10000), 4).unwrap_err(),
            manager.write_memory(Address::new(0x10000), &[1]).unwrap_err(),
            manager.resolve_module("game.exe").unwrap_err(),
        ] {
            assert_eq!(err.kind(), ErrorKind::ProcessNotAttached);
        }
        assert!(manager.scanner().is_err());
        assert!(!manager.is_accessible(Address::new(0x10000), 4));
    }

    #[test]
    fn test_attach_and_identity() {
        let manager = ProcessManager::default();
        manager.attach_source(42, "game.exe", mock()).unwrap();
        assert!(manager.is_attached());
        assert_eq!(manager.process_id(), Some(42));
        assert_eq!(manager.process_name().as_deref(), Some("game.exe"));
        assert_eq!(manager.module_base("game.exe").unwrap(), Address::new(0x400000));
        assert_eq!(manager.module_size("game.exe").unwrap(), 0x2000);
    }

    #[test]
    fn test_dead_source_rejected() {
        let manager = ProcessManager::default();
        let source = mock();
        source.set_alive(false);
        let err = manager.attach_source(7, "gone.exe", source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHandle);
        assert!(!manager.is_attached());
    }

    #[test]
    fn test_write_without_protection_lift() {
        let mut config = Config::default();
        config.process.restore_protection = false;
        let manager = ProcessManager::new(config);
        let source = mock();
        manager.attach_source(1, "game.exe", source.clone()).unwrap();

        manager.write_memory(Address::new(0x10010), &[9, 9]).unwrap();
        assert!(source.protect_calls().is_empty());

        // Read-only code stays read-only without the lift
        let err = manager.write_memory(Address::new(0x400000), &[0x90]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteMemoryFailed);
    }

    #[test]
    fn test_refresh_modules() {
        let manager = ProcessManager::default();
        manager.attach_source(1, "game.exe", mock()).unwrap();
        assert_eq!(manager.refresh_modules().unwrap(), 1);
        assert_eq!(manager.modules().unwrap()[0].name, "game.exe");
    }

    #[test]
    fn test_late_module_needs_refresh() {
        let manager = ProcessManager::default();
        let source = mock();
        manager.attach_source(1, "game.exe", source.clone()).unwrap();

        source.load_module("plugin.dll", 0x7000_0000, 0x3000);
        let err = manager.resolve_module("plugin.dll").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModuleNotFound);

        assert_eq!(manager.refresh_modules().unwrap(), 2);
        assert_eq!(manager.module_base("plugin.dll").unwrap(), Address::new(0x7000_0000));
    }

    #[test]
    fn test_scanner_outlives_detach() {
        let manager = ProcessManager::default();
        manager.attach_source(1, "game.exe", mock()).unwrap();
        let scanner = manager.scanner().unwrap();
        manager.detach();
        assert!(scanner.source().is_alive());
        assert_eq!(
            crate::memory::enumerate_regions(scanner.source(), &RegionFilter::all())
                .unwrap()
                .len(),
            2
        );
    }
}
