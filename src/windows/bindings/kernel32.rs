//! Kernel32.dll bindings for process and memory operations

use crate::core::types::{Address, MemoryError, MemoryResult, OsErrorCode, Protection};
use crate::windows::types::Handle;
use crate::windows::utils::{last_error_code, ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER, ERROR_PARTIAL_COPY};
use std::mem;
use winapi::shared::minwindef::{BOOL, DWORD, FALSE, LPCVOID, LPVOID};
use winapi::um::handleapi::CloseHandle;
use winapi::um::memoryapi::{ReadProcessMemory, VirtualProtectEx, VirtualQueryEx, WriteProcessMemory};
use winapi::um::processthreadsapi::{GetExitCodeProcess, OpenProcess};
use winapi::um::winnt::{HANDLE, MEMORY_BASIC_INFORMATION};
use winapi::um::wow64apiset::IsWow64Process;

/// Exit code reported while a process is still running
pub const STILL_ACTIVE: DWORD = 259;

/// Safe wrapper for OpenProcess
pub fn open_process(pid: u32, desired_access: u32) -> MemoryResult<Handle> {
    let handle = unsafe { OpenProcess(desired_access, FALSE, pid) };
    if !handle.is_null() {
        return Ok(Handle::new(handle));
    }

    let code = last_error_code();
    Err(match code.0 {
        ERROR_ACCESS_DENIED => MemoryError::access_denied(pid, "OpenProcess refused", Some(code)),
        ERROR_INVALID_PARAMETER => MemoryError::process_not_found(pid, Some(code)),
        _ => MemoryError::unknown(format!("OpenProcess failed for PID {}", pid), Some(code)),
    })
}

/// Safe wrapper for CloseHandle
///
/// # Safety
/// The handle must be a valid Windows handle that is not used afterwards
pub unsafe fn close_handle(handle: HANDLE) -> MemoryResult<()> {
    if handle.is_null() {
        return Ok(());
    }

    if CloseHandle(handle) == FALSE {
        Err(MemoryError::InvalidHandle(format!(
            "CloseHandle failed ({})",
            last_error_code()
        )))
    } else {
        Ok(())
    }
}

/// Outcome of a cross-process copy that may stop early
fn transfer_result(ok: BOOL, transferred: usize) -> Result<usize, OsErrorCode> {
    if ok != FALSE {
        return Ok(transferred);
    }
    let code = last_error_code();
    // A copy that crosses into an unreadable page stops there
    if code.0 == ERROR_PARTIAL_COPY && transferred > 0 {
        Ok(transferred)
    } else {
        Err(code)
    }
}

/// Safe wrapper for ReadProcessMemory
pub fn read_process_memory(handle: &Handle, address: Address, buffer: &mut [u8]) -> MemoryResult<usize> {
    let mut bytes_read = 0;
    let ok = unsafe {
        ReadProcessMemory(
            handle.raw(),
            address.0 as usize as LPCVOID,
            buffer.as_mut_ptr() as LPVOID,
            buffer.len(),
            &mut bytes_read,
        )
    };

    transfer_result(ok, bytes_read)
        .map_err(|code| MemoryError::read_failed(address, "ReadProcessMemory failed", Some(code)))
}

/// Safe wrapper for WriteProcessMemory
pub fn write_process_memory(handle: &Handle, address: Address, data: &[u8]) -> MemoryResult<usize> {
    let mut bytes_written = 0;
    let ok = unsafe {
        WriteProcessMemory(
            handle.raw(),
            address.0 as usize as LPVOID,
            data.as_ptr() as LPCVOID,
            data.len(),
            &mut bytes_written,
        )
    };

    transfer_result(ok, bytes_written)
        .map_err(|code| MemoryError::write_failed(address, "WriteProcessMemory failed", Some(code)))
}

/// Safe wrapper for VirtualQueryEx
///
/// Fails with `ERROR_INVALID_PARAMETER` once `address` is past the highest
/// user-mode address.
pub fn virtual_query_ex(handle: &Handle, address: Address) -> MemoryResult<MEMORY_BASIC_INFORMATION> {
    let mut mbi: MEMORY_BASIC_INFORMATION = unsafe { mem::zeroed() };

    let written = unsafe {
        VirtualQueryEx(
            handle.raw(),
            address.0 as usize as LPCVOID,
            &mut mbi,
            mem::size_of::<MEMORY_BASIC_INFORMATION>(),
        )
    };

    if written == 0 {
        Err(MemoryError::invalid_address(
            format!("VirtualQueryEx failed for {}", address),
            Some(last_error_code()),
        ))
    } else {
        Ok(mbi)
    }
}

/// Safe wrapper for VirtualProtectEx, returning the previous protection
pub fn virtual_protect_ex(
    handle: &Handle,
    address: Address,
    size: usize,
    protection: Protection,
) -> MemoryResult<Protection> {
    let mut old: DWORD = 0;
    let ok = unsafe {
        VirtualProtectEx(
            handle.raw(),
            address.0 as usize as LPVOID,
            size,
            protection.raw(),
            &mut old,
        )
    };

    if ok == FALSE {
        Err(MemoryError::write_failed(
            address,
            format!("VirtualProtectEx to {} failed", protection),
            Some(last_error_code()),
        ))
    } else {
        Ok(Protection(old))
    }
}

/// Safe wrapper for GetExitCodeProcess
pub fn exit_code(handle: &Handle) -> MemoryResult<DWORD> {
    let mut code: DWORD = 0;
    if unsafe { GetExitCodeProcess(handle.raw(), &mut code) } == FALSE {
        return Err(MemoryError::InvalidHandle(format!(
            "GetExitCodeProcess failed ({})",
            last_error_code()
        )));
    }
    Ok(code)
}

/// Safe wrapper for IsWow64Process
pub fn is_wow64_process(handle: &Handle) -> MemoryResult<bool> {
    let mut wow64: BOOL = FALSE;
    if unsafe { IsWow64Process(handle.raw(), &mut wow64) } == FALSE {
        return Err(MemoryError::unknown(
            "IsWow64Process failed",
            Some(last_error_code()),
        ));
    }
    Ok(wow64 != FALSE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ErrorKind;

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_open_invalid_process() {
        let err = open_process(0, 0x0400).unwrap_err();
        assert_ne!(err.kind(), ErrorKind::ProcessNotAttached);
        assert!(err.os_code().is_some());
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_null_handle_operations() {
        let handle = Handle::null();
        let mut buffer = [0u8; 4];
        let err = read_process_memory(&handle, Address::new(0x1000), &mut buffer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReadMemoryFailed);

        let err = write_process_memory(&handle, Address::new(0x1000), &buffer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteMemoryFailed);

        let err = virtual_query_ex(&handle, Address::new(0x1000)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAddress);
        assert!(err.os_code().is_some());

        assert!(exit_code(&handle).is_err());
        unsafe {
            assert!(close_handle(std::ptr::null_mut()).is_ok());
        }
    }
}
