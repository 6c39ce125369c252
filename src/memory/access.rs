//! Bounded, validated access to target memory
//!
//! Every read or write is preceded by a fresh region query: the whole range
//! has to sit inside one committed region that is neither guarded nor
//! no-access. Partial transfers are reported, not hidden.

use crate::core::types::{Address, MemoryError, MemoryRegion, MemoryResult};
use crate::memory::MemorySource;
use tracing::warn;

/// Outcome of a read or write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub requested: usize,
    pub transferred: usize,
}

impl Transfer {
    pub fn is_complete(&self) -> bool {
        self.transferred == self.requested
    }
}

/// Region holding the whole range, if it may be touched
pub fn accessible_region(source: &dyn MemorySource, address: Address, size: usize) -> Option<MemoryRegion> {
    if !source.is_alive() || address.is_null() || size == 0 {
        return None;
    }

    source
        .query(address)
        .ok()
        .filter(|region| region.is_readable() && region.contains_range(address, size as u64))
}

/// True only if `[address, address + size)` lies within one committed,
/// non-guarded, accessible region
pub fn is_accessible(source: &dyn MemorySource, address: Address, size: usize) -> bool {
    accessible_region(source, address, size).is_some()
}

/// Checks a range the way [`read`] and [`write`] do, returning its region
pub fn validate_range(source: &dyn MemorySource, address: Address, size: usize) -> MemoryResult<MemoryRegion> {
    if !source.is_alive() {
        return Err(MemoryError::InvalidHandle(
            "process handle is invalid or the target has exited".to_string(),
        ));
    }
    if address.is_null() {
        return Err(MemoryError::invalid_address("null address", None));
    }
    if size == 0 {
        return Err(MemoryError::InvalidSize("size must be non-zero".to_string()));
    }

    accessible_region(source, address, size).ok_or_else(|| {
        MemoryError::invalid_address(
            format!("{address} (+{size:#x}) is not inside one committed, accessible region"),
            None,
        )
    })
}

/// Reads into `buffer`, reporting how much was actually copied
pub fn read(source: &dyn MemorySource, address: Address, buffer: &mut [u8]) -> MemoryResult<Transfer> {
    validate_range(source, address, buffer.len())?;

    let transferred = source.read_raw(address, buffer)?;
    if transferred < buffer.len() {
        warn!(
            "Partial read at {}: {} of {} bytes",
            address,
            transferred,
            buffer.len()
        );
    }

    Ok(Transfer {
        requested: buffer.len(),
        transferred,
    })
}

/// Writes `data`, reporting how much was actually copied
pub fn write(source: &dyn MemorySource, address: Address, data: &[u8]) -> MemoryResult<Transfer> {
    let region = validate_range(source, address, data.len())?;
    if !region.is_writable() {
        warn!(
            "Writing to non-writable memory at {} ({})",
            address, region.protection
        );
    }

    let transferred = source.write_raw(address, data)?;
    if transferred < data.len() {
        warn!(
            "Partial write at {}: {} of {} bytes",
            address,
            transferred,
            data.len()
        );
    }

    Ok(Transfer {
        requested: data.len(),
        transferred,
    })
}

/// Reads exactly `size` bytes; a short transfer is an error
pub fn read_exact(source: &dyn MemorySource, address: Address, size: usize) -> MemoryResult<Vec<u8>> {
    let mut buffer = vec![0u8; size];
    let transfer = read(source, address, &mut buffer)?;
    if !transfer.is_complete() {
        return Err(MemoryError::read_failed(
            address,
            format!(
                "short read: {} of {} bytes",
                transfer.transferred, transfer.requested
            ),
            None,
        ));
    }
    Ok(buffer)
}

/// Writes all of `data`; a short transfer is an error
pub fn write_exact(source: &dyn MemorySource, address: Address, data: &[u8]) -> MemoryResult<()> {
    let transfer = write(source, address, data)?;
    if !transfer.is_complete() {
        return Err(MemoryError::write_failed(
            address,
            format!(
                "short write: {} of {} bytes",
                transfer.transferred, transfer.requested
            ),
            None,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ErrorKind, Protection};
    use crate::memory::mock::MockProcess;

    fn layout() -> MockProcess {
        MockProcess::builder()
            .zeroed_region(0x10000, 0x1000, Protection::READWRITE)
            .zeroed_region(0x11000, 0x1000, Protection::READWRITE)
            .zeroed_region(0x20000, 0x1000, Protection::READWRITE.with(Protection::GUARD))
            .zeroed_region(0x30000, 0x1000, Protection::NOACCESS)
            .build()
    }

    #[test]
    fn test_accessible_inside_one_region() {
        let mock = layout();
        assert!(is_accessible(&mock, Address::new(0x10000), 0x1000));
        assert!(is_accessible(&mock, Address::new(0x10FFF), 1));
    }

    #[test]
    fn test_inaccessible_ranges() {
        let mock = layout();
        // Crosses into the neighbouring region
        assert!(!is_accessible(&mock, Address::new(0x10FFF), 2));
        assert!(!is_accessible(&mock, Address::new(0x20000), 4));
        assert!(!is_accessible(&mock, Address::new(0x30000), 4));
        assert!(!is_accessible(&mock, Address::new(0x50000), 4));
        assert!(!is_accessible(&mock, Address::new(0x10000), 0));
        assert!(!is_accessible(&mock, Address::null(), 4));
    }

    #[test]
    fn test_rejects_dead_handle() {
        let mock = layout();
        mock.set_alive(false);
        let mut buf = [0u8; 4];
        let err = read(&mock, Address::new(0x10000), &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHandle);
        assert!(!is_accessible(&mock, Address::new(0x10000), 4));
    }

    #[test]
    fn test_rejects_malformed_requests() {
        let mock = layout();
        let mut empty = [0u8; 0];
        assert_eq!(
            read(&mock, Address::new(0x10000), &mut empty).unwrap_err().kind(),
            ErrorKind::InvalidSize
        );
        assert_eq!(
            write(&mock, Address::null(), &[1]).unwrap_err().kind(),
            ErrorKind::InvalidAddress
        );
    }

    #[test]
    fn test_partial_transfer_is_reported() {
        let mock = layout();
        mock.set_transfer_limit(Some(3));
        let mut buf = [0u8; 8];
        let transfer = read(&mock, Address::new(0x10000), &mut buf).unwrap();
        assert_eq!(transfer.transferred, 3);
        assert!(!transfer.is_complete());

        let err = read_exact(&mock, Address::new(0x10000), 8).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReadMemoryFailed);
        let err = write_exact(&mock, Address::new(0x10000), &[1; 8]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteMemoryFailed);
    }

    #[test]
    fn test_round_trip() {
        let mock = layout();
        write_exact(&mock, Address::new(0x10010), b"hello").unwrap();
        assert_eq!(read_exact(&mock, Address::new(0x10010), 5).unwrap(), b"hello");
    }
}
