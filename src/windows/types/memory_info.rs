//! MEMORY_BASIC_INFORMATION conversion

use crate::core::types::{Address, MemoryRegion, Protection, RegionState, RegionType};
use winapi::um::winnt::MEMORY_BASIC_INFORMATION;

/// Converts a VirtualQueryEx record into a catalogue region
///
/// The owning module is left empty; the region catalogue fills it in from the
/// module table.
pub fn region_from_basic_info(mbi: &MEMORY_BASIC_INFORMATION) -> MemoryRegion {
    MemoryRegion {
        base_address: Address::new(mbi.BaseAddress as usize as u64),
        size: mbi.RegionSize as u64,
        protection: Protection(mbi.Protect),
        state: RegionState::from_raw(mbi.State),
        region_type: RegionType::from_raw(mbi.Type),
        module_name: None,
    }
}
