//! Error taxonomy for memory-probe

use super::address::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Raw OS error code captured at the failure site
///
/// The human-readable text is only looked up when the code is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OsErrorCode(pub u32);

impl OsErrorCode {
    /// Captures the calling thread's last OS error
    pub fn last() -> Self {
        #[cfg(windows)]
        {
            crate::windows::utils::last_error_code()
        }
        #[cfg(not(windows))]
        {
            let raw = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            OsErrorCode(raw as u32)
        }
    }

    /// Resolves the system message for this code
    pub fn message(&self) -> String {
        #[cfg(windows)]
        {
            crate::windows::utils::format_error_message(*self)
        }
        #[cfg(not(windows))]
        {
            std::io::Error::from_raw_os_error(self.0 as i32).to_string()
        }
    }
}

impl fmt::Display for OsErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "os error {}: {}", self.0, self.message())
    }
}

fn os_suffix(code: &Option<OsErrorCode>) -> String {
    match code {
        Some(code) => format!(" ({code})"),
        None => String::new(),
    }
}

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Process not found: {target}{}", os_suffix(.os_code))]
    ProcessNotFound {
        target: String,
        os_code: Option<OsErrorCode>,
    },

    #[error("Access denied to process {pid}: {reason}{}", os_suffix(.os_code))]
    AccessDenied {
        pid: u32,
        reason: String,
        os_code: Option<OsErrorCode>,
    },

    #[error("Invalid memory address: {reason}{}", os_suffix(.os_code))]
    InvalidAddress {
        reason: String,
        os_code: Option<OsErrorCode>,
    },

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Failed to read memory at {address}: {reason}{}", os_suffix(.os_code))]
    ReadMemoryFailed {
        address: Address,
        reason: String,
        os_code: Option<OsErrorCode>,
    },

    #[error("Failed to write memory at {address}: {reason}{}", os_suffix(.os_code))]
    WriteMemoryFailed {
        address: Address,
        reason: String,
        os_code: Option<OsErrorCode>,
    },

    #[error("Scanning failed: {0}")]
    ScanningFailed(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Invalid pattern format: {0}")]
    InvalidPattern(String),

    #[error("Insufficient privileges: {reason}{}", os_suffix(.os_code))]
    InsufficientPrivileges {
        reason: String,
        os_code: Option<OsErrorCode>,
    },

    #[error("No process attached")]
    ProcessNotAttached,

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Unknown error: {reason}{}", os_suffix(.os_code))]
    UnknownError {
        reason: String,
        os_code: Option<OsErrorCode>,
    },
}

/// Result type alias for engine operations
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Serializable tag of a [`MemoryError`], for callers that marshal failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ProcessNotFound,
    AccessDenied,
    InvalidAddress,
    InvalidSize,
    ReadMemoryFailed,
    WriteMemoryFailed,
    ScanningFailed,
    ModuleNotFound,
    InvalidPattern,
    InsufficientPrivileges,
    ProcessNotAttached,
    InvalidHandle,
    UnknownError,
}

impl MemoryError {
    /// Returns the taxonomy tag of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MemoryError::ProcessNotFound { .. } => ErrorKind::ProcessNotFound,
            MemoryError::AccessDenied { .. } => ErrorKind::AccessDenied,
            MemoryError::InvalidAddress { .. } => ErrorKind::InvalidAddress,
            MemoryError::InvalidSize(_) => ErrorKind::InvalidSize,
            MemoryError::ReadMemoryFailed { .. } => ErrorKind::ReadMemoryFailed,
            MemoryError::WriteMemoryFailed { .. } => ErrorKind::WriteMemoryFailed,
            MemoryError::ScanningFailed(_) => ErrorKind::ScanningFailed,
            MemoryError::ModuleNotFound(_) => ErrorKind::ModuleNotFound,
            MemoryError::InvalidPattern(_) => ErrorKind::InvalidPattern,
            MemoryError::InsufficientPrivileges { .. } => ErrorKind::InsufficientPrivileges,
            MemoryError::ProcessNotAttached => ErrorKind::ProcessNotAttached,
            MemoryError::InvalidHandle(_) => ErrorKind::InvalidHandle,
            MemoryError::UnknownError { .. } => ErrorKind::UnknownError,
        }
    }

    /// Returns the OS error code attached to this error, if any
    pub fn os_code(&self) -> Option<OsErrorCode> {
        match self {
            MemoryError::ProcessNotFound { os_code, .. }
            | MemoryError::AccessDenied { os_code, .. }
            | MemoryError::InvalidAddress { os_code, .. }
            | MemoryError::ReadMemoryFailed { os_code, .. }
            | MemoryError::WriteMemoryFailed { os_code, .. }
            | MemoryError::InsufficientPrivileges { os_code, .. }
            | MemoryError::UnknownError { os_code, .. } => *os_code,
            _ => None,
        }
    }

    /// Creates a process-not-found error
    pub fn process_not_found(target: impl fmt::Display, os_code: Option<OsErrorCode>) -> Self {
        MemoryError::ProcessNotFound {
            target: target.to_string(),
            os_code,
        }
    }

    /// Creates an access denied error for a process
    pub fn access_denied(pid: u32, reason: impl Into<String>, os_code: Option<OsErrorCode>) -> Self {
        MemoryError::AccessDenied {
            pid,
            reason: reason.into(),
            os_code,
        }
    }

    /// Creates an invalid address error
    pub fn invalid_address(reason: impl Into<String>, os_code: Option<OsErrorCode>) -> Self {
        MemoryError::InvalidAddress {
            reason: reason.into(),
            os_code,
        }
    }

    /// Creates a read failed error
    pub fn read_failed(
        address: Address,
        reason: impl Into<String>,
        os_code: Option<OsErrorCode>,
    ) -> Self {
        MemoryError::ReadMemoryFailed {
            address,
            reason: reason.into(),
            os_code,
        }
    }

    /// Creates a write failed error
    pub fn write_failed(
        address: Address,
        reason: impl Into<String>,
        os_code: Option<OsErrorCode>,
    ) -> Self {
        MemoryError::WriteMemoryFailed {
            address,
            reason: reason.into(),
            os_code,
        }
    }

    /// Creates an insufficient privileges error
    pub fn insufficient_privileges(reason: impl Into<String>, os_code: Option<OsErrorCode>) -> Self {
        MemoryError::InsufficientPrivileges {
            reason: reason.into(),
            os_code,
        }
    }

    /// Creates an error for an OS failure that fits no other tag
    pub fn unknown(reason: impl Into<String>, os_code: Option<OsErrorCode>) -> Self {
        MemoryError::UnknownError {
            reason: reason.into(),
            os_code,
        }
    }
}
