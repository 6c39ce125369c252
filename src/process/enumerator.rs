//! Process enumeration using the ToolHelp32 API

use crate::core::types::{MemoryError, MemoryResult, ProcessInfo};
use crate::windows::types::Handle;
use crate::windows::utils::{last_error_code, wide_to_string};
use std::mem;
use winapi::shared::minwindef::FALSE;
use winapi::um::tlhelp32::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W, TH32CS_SNAPPROCESS,
};

/// Iterator over a process snapshot
pub struct ProcessEnumerator {
    snapshot: Handle,
    first_called: bool,
}

impl ProcessEnumerator {
    /// Takes a snapshot of the running processes
    pub fn new() -> MemoryResult<Self> {
        let snapshot = Handle::new(unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) });
        if snapshot.is_invalid() {
            return Err(MemoryError::unknown(
                "Failed to create process snapshot",
                Some(last_error_code()),
            ));
        }
        Ok(ProcessEnumerator {
            snapshot,
            first_called: false,
        })
    }
}

impl Iterator for ProcessEnumerator {
    type Item = ProcessInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let mut entry: PROCESSENTRY32W = unsafe { mem::zeroed() };
        entry.dwSize = mem::size_of::<PROCESSENTRY32W>() as u32;

        let ok = unsafe {
            if self.first_called {
                Process32NextW(self.snapshot.raw(), &mut entry)
            } else {
                self.first_called = true;
                Process32FirstW(self.snapshot.raw(), &mut entry)
            }
        };
        if ok == FALSE {
            return None;
        }

        Some(ProcessInfo {
            pid: entry.th32ProcessID,
            name: wide_to_string(&entry.szExeFile),
            parent_pid: Some(entry.th32ParentProcessID),
            thread_count: entry.cntThreads,
        })
    }
}

/// Every running process
pub fn enumerate_processes() -> MemoryResult<Vec<ProcessInfo>> {
    Ok(ProcessEnumerator::new()?.collect())
}

/// First process whose executable name is exactly `name`
pub fn find_process_by_name(name: &str) -> MemoryResult<Option<ProcessInfo>> {
    Ok(ProcessEnumerator::new()?.find(|p| p.name == name))
}

/// The process with this PID, if it is running
pub fn find_process_by_pid(pid: u32) -> MemoryResult<Option<ProcessInfo>> {
    Ok(ProcessEnumerator::new()?.find(|p| p.pid == pid))
}
