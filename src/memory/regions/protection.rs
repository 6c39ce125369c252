//! Scoped page-protection changes

use crate::core::types::{Address, MemoryResult, Protection};
use crate::memory::MemorySource;
use tracing::{debug, warn};

/// Restores the original protection of a range when dropped
///
/// Overlapping guards on the same range restore in drop order, so a
/// concurrent writer on that range can observe the other's protection.
pub struct ProtectionGuard<'a> {
    source: &'a dyn MemorySource,
    address: Address,
    size: usize,
    original: Protection,
}

impl<'a> ProtectionGuard<'a> {
    /// Applies `protection` to the range, remembering what it replaced
    pub fn change(
        source: &'a dyn MemorySource,
        address: Address,
        size: usize,
        protection: Protection,
    ) -> MemoryResult<Self> {
        let original = source.protect(address, size, protection)?;
        debug!(
            "Protection at {} changed {} -> {}",
            address, original, protection
        );
        Ok(ProtectionGuard {
            source,
            address,
            size,
            original,
        })
    }

    /// Protection in effect before the guard was taken
    pub fn original(&self) -> Protection {
        self.original
    }
}

impl Drop for ProtectionGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.source.protect(self.address, self.size, self.original) {
            warn!(
                "Failed to restore protection {} at {}: {}",
                self.original, self.address, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::mock::MockProcess;

    #[test]
    fn test_guard_restores_on_drop() {
        let mock = MockProcess::builder()
            .zeroed_region(0x1000, 0x1000, Protection::READONLY)
            .build();
        {
            let guard =
                ProtectionGuard::change(&mock, Address::new(0x1000), 4, Protection::EXECUTE_READWRITE)
                    .unwrap();
            assert_eq!(guard.original(), Protection::READONLY);
            assert_eq!(
                mock.protection_at(Address::new(0x1000)),
                Some(Protection::EXECUTE_READWRITE)
            );
        }
        assert_eq!(
            mock.protection_at(Address::new(0x1000)),
            Some(Protection::READONLY)
        );
    }

    #[test]
    fn test_change_fails_on_unmapped() {
        let mock = MockProcess::builder().build();
        assert!(
            ProtectionGuard::change(&mock, Address::new(0x1000), 4, Protection::READWRITE).is_err()
        );
        assert!(mock.protect_calls().is_empty());
    }
}
