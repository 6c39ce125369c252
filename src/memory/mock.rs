//! Synthetic process for tests and benchmarks
//!
//! Serves a fixed region layout from in-memory buffers with the same query,
//! read, write and protect semantics the engine expects from a live target,
//! plus knobs to inject short transfers, write failures and process exit.

use crate::core::types::{
    Address, MemoryError, MemoryRegion, MemoryResult, ModuleInfo, OsErrorCode, Protection,
    RegionState, RegionType,
};
use crate::memory::MemorySource;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// First address past the simulated user address space
pub const USER_SPACE_END: u64 = 0x7FFF_FFFF_0000;

const ERROR_ACCESS_DENIED: u32 = 5;
const ERROR_PARTIAL_COPY: u32 = 299;
const ERROR_NOACCESS: u32 = 998;

#[derive(Debug, Clone)]
struct MockRegion {
    region: MemoryRegion,
    data: Vec<u8>,
}

/// In-memory stand-in for an attached process
#[derive(Debug)]
pub struct MockProcess {
    regions: RwLock<Vec<MockRegion>>,
    modules: RwLock<Vec<ModuleInfo>>,
    pointer_size: usize,
    alive: AtomicBool,
    transfer_limit: AtomicUsize,
    fail_writes: AtomicBool,
    largest_read: AtomicUsize,
    reads: AtomicUsize,
    protect_calls: Mutex<Vec<(Address, Protection)>>,
}

impl MockProcess {
    /// Starts a new layout
    pub fn builder() -> MockProcessBuilder {
        MockProcessBuilder::new()
    }

    /// Marks the process as exited (or alive again)
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Caps every transfer at `limit` bytes to simulate partial copies
    pub fn set_transfer_limit(&self, limit: Option<usize>) {
        self.transfer_limit
            .store(limit.unwrap_or(usize::MAX), Ordering::SeqCst);
    }

    /// Makes every write fail with an access-denied code
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Largest single read request observed so far
    pub fn largest_read(&self) -> usize {
        self.largest_read.load(Ordering::SeqCst)
    }

    /// Number of read requests served
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Every protection change applied, in order
    pub fn protect_calls(&self) -> Vec<(Address, Protection)> {
        lock(&self.protect_calls).clone()
    }

    /// Current protection of the region containing `address`
    pub fn protection_at(&self, address: Address) -> Option<Protection> {
        read_lock(&self.regions)
            .iter()
            .find(|r| r.region.contains(address))
            .map(|r| r.region.protection)
    }

    /// Loads a module after the process was built, as a late LoadLibrary would
    pub fn load_module(&self, name: &str, base: u64, size: u64) {
        write_lock(&self.modules).push(ModuleInfo::new(name, Address::new(base), size));
    }

    /// Mutates target bytes directly, ignoring protection, as the target itself would
    pub fn poke(&self, address: Address, bytes: &[u8]) -> bool {
        let mut regions = write_lock(&self.regions);
        match regions
            .iter_mut()
            .find(|r| r.region.contains_range(address, bytes.len() as u64))
        {
            Some(r) => {
                let start = (address.0 - r.region.base_address.0) as usize;
                r.data[start..start + bytes.len()].copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }

    /// Reads target bytes directly, ignoring protection
    pub fn peek(&self, address: Address, len: usize) -> Option<Vec<u8>> {
        read_lock(&self.regions)
            .iter()
            .find(|r| r.region.contains_range(address, len as u64))
            .map(|r| {
                let start = (address.0 - r.region.base_address.0) as usize;
                r.data[start..start + len].to_vec()
            })
    }

    fn limit(&self, len: usize) -> usize {
        len.min(self.transfer_limit.load(Ordering::SeqCst))
    }
}

impl MemorySource for MockProcess {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn query(&self, address: Address) -> MemoryResult<MemoryRegion> {
        if address.0 >= USER_SPACE_END {
            return Err(MemoryError::invalid_address(
                format!("{address} is past the end of the address space"),
                None,
            ));
        }

        let regions = read_lock(&self.regions);
        if let Some(r) = regions.iter().find(|r| r.region.contains(address)) {
            return Ok(r.region.clone());
        }

        // Gap between mappings: report it as one free region
        let base = regions
            .iter()
            .map(|r| r.region.end_address().0)
            .filter(|end| *end <= address.0)
            .max()
            .unwrap_or(0);
        let end = regions
            .iter()
            .map(|r| r.region.base_address.0)
            .filter(|start| *start > address.0)
            .min()
            .unwrap_or(USER_SPACE_END);

        Ok(MemoryRegion {
            base_address: Address::new(base),
            size: end - base,
            protection: Protection::NOACCESS,
            state: RegionState::Free,
            region_type: RegionType::Unknown,
            module_name: None,
        })
    }

    fn read_raw(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.largest_read.fetch_max(buffer.len(), Ordering::SeqCst);

        let regions = read_lock(&self.regions);
        let r = regions
            .iter()
            .find(|r| r.region.contains(address))
            .ok_or_else(|| {
                MemoryError::read_failed(address, "unmapped", Some(OsErrorCode(ERROR_PARTIAL_COPY)))
            })?;
        if !r.region.is_readable() {
            return Err(MemoryError::read_failed(
                address,
                "page not readable",
                Some(OsErrorCode(ERROR_NOACCESS)),
            ));
        }

        let start = (address.0 - r.region.base_address.0) as usize;
        let n = self.limit(buffer.len().min(r.data.len() - start));
        buffer[..n].copy_from_slice(&r.data[start..start + n]);
        Ok(n)
    }

    fn write_raw(&self, address: Address, data: &[u8]) -> MemoryResult<usize> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MemoryError::write_failed(
                address,
                "write rejected",
                Some(OsErrorCode(ERROR_ACCESS_DENIED)),
            ));
        }

        let mut regions = write_lock(&self.regions);
        let r = regions
            .iter_mut()
            .find(|r| r.region.contains(address))
            .ok_or_else(|| {
                MemoryError::write_failed(address, "unmapped", Some(OsErrorCode(ERROR_PARTIAL_COPY)))
            })?;
        if !r.region.is_writable() {
            return Err(MemoryError::write_failed(
                address,
                "page not writable",
                Some(OsErrorCode(ERROR_NOACCESS)),
            ));
        }

        let start = (address.0 - r.region.base_address.0) as usize;
        let n = self.limit(data.len().min(r.data.len() - start));
        r.data[start..start + n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    fn protect(&self, address: Address, _size: usize, protection: Protection) -> MemoryResult<Protection> {
        let mut regions = write_lock(&self.regions);
        let r = regions
            .iter_mut()
            .find(|r| r.region.contains(address))
            .ok_or_else(|| MemoryError::invalid_address(address.to_string(), None))?;
        let old = r.region.protection;
        r.region.protection = protection;
        lock(&self.protect_calls).push((address, protection));
        Ok(old)
    }

    fn modules(&self) -> MemoryResult<Vec<ModuleInfo>> {
        Ok(read_lock(&self.modules).clone())
    }

    fn pointer_size(&self) -> usize {
        self.pointer_size
    }
}

/// Fluent constructor for [`MockProcess`] layouts
#[derive(Debug, Clone)]
pub struct MockProcessBuilder {
    regions: Vec<MockRegion>,
    modules: Vec<ModuleInfo>,
    pointer_size: usize,
}

impl Default for MockProcessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProcessBuilder {
    pub fn new() -> Self {
        MockProcessBuilder {
            regions: Vec::new(),
            modules: Vec::new(),
            pointer_size: 8,
        }
    }

    /// Adds a committed private region holding `data`
    pub fn region(self, base: u64, data: Vec<u8>, protection: Protection) -> Self {
        let region = MemoryRegion::new(Address::new(base), data.len() as u64, protection);
        self.region_with(region, data)
    }

    /// Adds a committed private region of `size` zero bytes
    pub fn zeroed_region(self, base: u64, size: usize, protection: Protection) -> Self {
        self.region(base, vec![0; size], protection)
    }

    /// Adds an arbitrary region; `data` is resized to the region size
    pub fn region_with(mut self, region: MemoryRegion, mut data: Vec<u8>) -> Self {
        data.resize(region.size as usize, 0);
        self.regions.push(MockRegion { region, data });
        self
    }

    /// Registers a loaded module
    pub fn module(mut self, name: &str, base: u64, size: u64) -> Self {
        self.modules
            .push(ModuleInfo::new(name, Address::new(base), size));
        self
    }

    /// Pointer width of the simulated target
    pub fn pointer_size(mut self, size: usize) -> Self {
        self.pointer_size = size;
        self
    }

    pub fn build(mut self) -> MockProcess {
        self.regions.sort_by_key(|r| r.region.base_address);
        MockProcess {
            regions: RwLock::new(self.regions),
            modules: RwLock::new(self.modules),
            pointer_size: self.pointer_size,
            alive: AtomicBool::new(true),
            transfer_limit: AtomicUsize::new(usize::MAX),
            fail_writes: AtomicBool::new(false),
            largest_read: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            protect_calls: Mutex::new(Vec::new()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
