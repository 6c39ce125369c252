//! Memory region filtering

use crate::core::types::MemoryRegion;

/// Which committed regions a catalogue walk keeps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionFilter {
    /// Keep only regions with an execute permission
    pub executable_only: bool,
    /// Keep only regions with a write permission
    pub writable_only: bool,
    /// Keep only regions whose owning module name contains this text
    pub module: Option<String>,
}

impl RegionFilter {
    /// Every committed region
    pub fn all() -> Self {
        RegionFilter::default()
    }

    /// Filter for executable regions only
    pub fn executable(mut self) -> Self {
        self.executable_only = true;
        self
    }

    /// Filter for writable regions only
    pub fn writable(mut self) -> Self {
        self.writable_only = true;
        self
    }

    /// Filter for regions owned by a module
    pub fn in_module(mut self, name: impl Into<String>) -> Self {
        self.module = Some(name.into());
        self
    }

    /// Check if a region satisfies the filter
    pub fn matches(&self, region: &MemoryRegion) -> bool {
        if !region.is_committed() {
            return false;
        }
        if self.executable_only && !region.protection.is_executable() {
            return false;
        }
        if self.writable_only && !region.protection.is_writable() {
            return false;
        }
        if let Some(module) = &self.module {
            match &region.module_name {
                Some(name) if name.contains(module.as_str()) => {}
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Address, Protection, RegionState};

    fn region(protection: Protection) -> MemoryRegion {
        MemoryRegion::new(Address::new(0x1000), 0x1000, protection)
    }

    #[test]
    fn test_default_keeps_committed_only() {
        let filter = RegionFilter::all();
        assert!(filter.matches(&region(Protection::READONLY)));

        let mut reserved = region(Protection::READONLY);
        reserved.state = RegionState::Reserved;
        assert!(!filter.matches(&reserved));
    }

    #[test]
    fn test_permission_filters() {
        let exec = RegionFilter::all().executable();
        assert!(exec.matches(&region(Protection::EXECUTE_READ)));
        assert!(!exec.matches(&region(Protection::READWRITE)));

        let both = RegionFilter::all().executable().writable();
        assert!(both.matches(&region(Protection::EXECUTE_READWRITE)));
        assert!(!both.matches(&region(Protection::EXECUTE_READ)));
    }

    #[test]
    fn test_module_filter_is_substring() {
        let filter = RegionFilter::all().in_module("game");
        let mut owned = region(Protection::READONLY);
        assert!(!filter.matches(&owned));
        owned.module_name = Some("game.exe".to_string());
        assert!(filter.matches(&owned));
    }
}
