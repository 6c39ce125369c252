//! Owned HANDLE with automatic cleanup

use crate::windows::bindings::kernel32;
use std::fmt;
use std::ptr;
use winapi::um::handleapi::INVALID_HANDLE_VALUE;
use winapi::um::winnt::HANDLE;

/// Owned Windows HANDLE, closed on drop
pub struct Handle {
    handle: HANDLE,
}

impl Handle {
    pub fn new(handle: HANDLE) -> Self {
        Handle { handle }
    }

    pub fn null() -> Self {
        Handle {
            handle: ptr::null_mut(),
        }
    }

    /// Null or `INVALID_HANDLE_VALUE`
    pub fn is_invalid(&self) -> bool {
        self.handle.is_null() || self.handle == INVALID_HANDLE_VALUE
    }

    pub fn raw(&self) -> HANDLE {
        self.handle
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if !self.is_invalid() {
            unsafe {
                let _ = kernel32::close_handle(self.handle);
            }
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:p})", self.handle)
    }
}

// Kernel handles are process-wide and the calls made on them are thread-safe
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle() {
        let handle = Handle::null();
        assert!(handle.is_invalid());
        assert_eq!(handle.raw(), ptr::null_mut());
    }

    #[test]
    fn test_invalid_value_not_closed() {
        let handle = Handle::new(INVALID_HANDLE_VALUE);
        assert!(handle.is_invalid());
        drop(handle);
    }
}
