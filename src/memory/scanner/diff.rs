//! Byte-level region comparison

use super::{matchers, MemoryScanner};
use crate::core::types::{Address, MemoryError, MemoryResult};
use crate::memory::access;
use crate::memory::limits::ResultSink;

impl MemoryScanner {
    fn check_diff_size(&self, size: usize) -> MemoryResult<()> {
        if size == 0 {
            return Err(MemoryError::InvalidSize("diff size must be non-zero".to_string()));
        }
        if size as u64 > self.limits().max_region_size {
            return Err(MemoryError::InvalidSize(format!(
                "diff size {:#x} exceeds the per-region maximum {:#x}",
                size,
                self.limits().max_region_size
            )));
        }
        Ok(())
    }

    /// Offsets (as addresses in the first range) where two live ranges differ
    pub fn compare_regions(&self, first: Address, second: Address, size: usize) -> MemoryResult<Vec<Address>> {
        self.check_diff_size(size)?;
        let before = access::read_exact(self.source(), first, size)?;
        let after = access::read_exact(self.source(), second, size)?;

        let mut sink = ResultSink::new(self.limits().max_results);
        matchers::diff_bytes(first, &before, &after, &mut sink);
        Ok(sink.into_vec())
    }

    /// Addresses whose live byte no longer equals `baseline`
    pub fn find_changed_bytes(&self, address: Address, baseline: &[u8]) -> MemoryResult<Vec<Address>> {
        self.check_diff_size(baseline.len())?;
        let current = access::read_exact(self.source(), address, baseline.len())?;

        let mut sink = ResultSink::new(self.limits().max_results);
        matchers::diff_bytes(address, baseline, &current, &mut sink);
        Ok(sink.into_vec())
    }
}
