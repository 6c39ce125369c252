//! Memory region enumeration

use super::RegionFilter;
use crate::core::types::{Address, MemoryError, MemoryRegion, MemoryResult, ModuleInfo};
use crate::memory::MemorySource;
use tracing::{debug, trace};

/// Walks the address space region by region
///
/// Each step queries the region at the previous region's end, stopping when
/// the query fails (space exhausted) or the walk stops making progress.
pub struct RegionWalker<'a> {
    source: &'a dyn MemorySource,
    next: Option<Address>,
}

impl<'a> RegionWalker<'a> {
    pub fn new(source: &'a dyn MemorySource) -> Self {
        RegionWalker {
            source,
            next: Some(Address::null()),
        }
    }

    /// Starts the walk at `address` instead of the bottom of the space
    pub fn starting_at(source: &'a dyn MemorySource, address: Address) -> Self {
        RegionWalker {
            source,
            next: Some(address),
        }
    }
}

impl Iterator for RegionWalker<'_> {
    type Item = MemoryRegion;

    fn next(&mut self) -> Option<Self::Item> {
        let address = self.next?;
        match self.source.query(address) {
            Ok(region) => {
                let end = region.end_address();
                self.next = (end > address).then_some(end);
                Some(region)
            }
            Err(e) => {
                trace!("Region walk ended at {}: {}", address, e);
                self.next = None;
                None
            }
        }
    }
}

fn owning_module(modules: &[ModuleInfo], address: Address) -> Option<String> {
    modules
        .iter()
        .find(|m| m.contains_address(address))
        .map(|m| m.name.clone())
}

fn load_modules(source: &dyn MemorySource) -> Vec<ModuleInfo> {
    source.modules().unwrap_or_else(|e| {
        debug!("Module table unavailable, region owners left empty: {}", e);
        Vec::new()
    })
}

fn ensure_alive(source: &dyn MemorySource) -> MemoryResult<()> {
    if source.is_alive() {
        Ok(())
    } else {
        Err(MemoryError::InvalidHandle(
            "process handle is invalid or the target has exited".to_string(),
        ))
    }
}

/// Every committed region matching `filter`, in ascending address order
pub fn enumerate_regions(source: &dyn MemorySource, filter: &RegionFilter) -> MemoryResult<Vec<MemoryRegion>> {
    ensure_alive(source)?;
    let modules = load_modules(source);

    let regions: Vec<MemoryRegion> = RegionWalker::new(source)
        .filter(MemoryRegion::is_committed)
        .map(|mut region| {
            region.module_name = owning_module(&modules, region.base_address);
            region
        })
        .filter(|region| filter.matches(region))
        .collect();

    debug!("Enumerated {} regions ({:?})", regions.len(), filter);
    Ok(regions)
}

/// The region containing `address`, whatever its state
pub fn region_for(source: &dyn MemorySource, address: Address) -> MemoryResult<MemoryRegion> {
    ensure_alive(source)?;
    let mut region = source.query(address)?;
    region.module_name = owning_module(&load_modules(source), region.base_address);
    Ok(region)
}

/// Committed regions owned by a module whose name contains `module_name`
pub fn module_regions(source: &dyn MemorySource, module_name: &str) -> MemoryResult<Vec<MemoryRegion>> {
    enumerate_regions(source, &RegionFilter::all().in_module(module_name))
}

/// Committed and neither guarded nor no-access
pub fn is_valid_address(source: &dyn MemorySource, address: Address) -> bool {
    source
        .query(address)
        .map(|r| r.is_readable())
        .unwrap_or(false)
}

pub fn is_executable_address(source: &dyn MemorySource, address: Address) -> bool {
    source
        .query(address)
        .map(|r| r.is_executable())
        .unwrap_or(false)
}

pub fn is_writable_address(source: &dyn MemorySource, address: Address) -> bool {
    source
        .query(address)
        .map(|r| r.is_writable())
        .unwrap_or(false)
}

/// Committed and executable, i.e. a plausible code address
pub fn is_valid_code_address(source: &dyn MemorySource, address: Address) -> bool {
    !address.is_null() && is_executable_address(source, address)
}
