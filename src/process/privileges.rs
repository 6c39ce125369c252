//! SeDebugPrivilege elevation

use crate::core::types::{MemoryError, MemoryResult};
use crate::windows::types::Handle;
use crate::windows::utils::{last_error_code, string_to_wide, ERROR_NOT_ALL_ASSIGNED};
use lazy_static::lazy_static;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use winapi::shared::minwindef::{DWORD, FALSE};
use winapi::um::processthreadsapi::{GetCurrentProcess, OpenProcessToken};
use winapi::um::securitybaseapi::AdjustTokenPrivileges;
use winapi::um::winbase::LookupPrivilegeValueW;
use winapi::um::winnt::{
    HANDLE, LUID, LUID_AND_ATTRIBUTES, SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES,
    TOKEN_PRIVILEGES, TOKEN_QUERY,
};

lazy_static! {
    static ref SE_DEBUG_NAME: Vec<u16> = string_to_wide("SeDebugPrivilege");
}

static DEBUG_PRIVILEGE_ENABLED: AtomicBool = AtomicBool::new(false);

/// Whether an earlier call enabled SeDebugPrivilege for this process
pub fn has_debug_privilege() -> bool {
    DEBUG_PRIVILEGE_ENABLED.load(Ordering::Relaxed)
}

/// Enables SeDebugPrivilege on the current process token
///
/// Succeeds immediately once the privilege has been enabled. Fails with
/// `InsufficientPrivileges` when the token does not hold the privilege at
/// all, which is the normal case for a non-elevated caller.
pub fn enable_debug_privilege() -> MemoryResult<()> {
    if has_debug_privilege() {
        return Ok(());
    }

    let mut raw_token: HANDLE = ptr::null_mut();
    let opened = unsafe {
        OpenProcessToken(
            GetCurrentProcess(),
            TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
            &mut raw_token,
        )
    };
    if opened == FALSE {
        return Err(MemoryError::insufficient_privileges(
            "failed to open process token",
            Some(last_error_code()),
        ));
    }
    let token = Handle::new(raw_token);

    let mut luid = LUID {
        LowPart: 0,
        HighPart: 0,
    };
    if unsafe { LookupPrivilegeValueW(ptr::null(), SE_DEBUG_NAME.as_ptr(), &mut luid) } == FALSE {
        return Err(MemoryError::insufficient_privileges(
            "failed to look up SeDebugPrivilege",
            Some(last_error_code()),
        ));
    }

    let mut privileges = TOKEN_PRIVILEGES {
        PrivilegeCount: 1,
        Privileges: [LUID_AND_ATTRIBUTES {
            Luid: luid,
            Attributes: SE_PRIVILEGE_ENABLED,
        }],
    };

    let adjusted = unsafe {
        AdjustTokenPrivileges(
            token.raw(),
            FALSE,
            &mut privileges,
            std::mem::size_of::<TOKEN_PRIVILEGES>() as DWORD,
            ptr::null_mut(),
            ptr::null_mut(),
        )
    };
    // AdjustTokenPrivileges reports success even when nothing was assigned
    let code = last_error_code();
    if adjusted == FALSE || code.0 == ERROR_NOT_ALL_ASSIGNED {
        return Err(MemoryError::insufficient_privileges(
            "SeDebugPrivilege could not be enabled",
            Some(code),
        ));
    }

    DEBUG_PRIVILEGE_ENABLED.store(true, Ordering::Relaxed);
    info!("SeDebugPrivilege enabled");
    Ok(())
}
