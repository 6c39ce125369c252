//! Windows error codes and string helpers

pub mod string_conv;

pub use string_conv::{string_to_wide, wide_to_string};

use crate::core::types::OsErrorCode;
use winapi::um::errhandlingapi::GetLastError;

pub const ERROR_ACCESS_DENIED: u32 = 5;
pub const ERROR_INVALID_PARAMETER: u32 = 87;
pub const ERROR_PARTIAL_COPY: u32 = 299;
pub const ERROR_NOT_ALL_ASSIGNED: u32 = 1300;

/// Captures the calling thread's last error
pub fn last_error_code() -> OsErrorCode {
    OsErrorCode(unsafe { GetLastError() })
}

/// System message text for `code`, without the trailing line break
pub fn format_error_message(code: OsErrorCode) -> String {
    let message = ::windows::core::HRESULT::from_win32(code.0).message().to_string();
    let message = message.trim_end();
    if message.is_empty() {
        format!("unknown error {:#x}", code.0)
    } else {
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_message() {
        let text = format_error_message(OsErrorCode(ERROR_ACCESS_DENIED));
        assert!(!text.is_empty());
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn test_display_includes_code() {
        let text = OsErrorCode(ERROR_PARTIAL_COPY).to_string();
        assert!(text.starts_with("os error 299: "));
    }
}
