//! PSAPI.dll bindings for module enumeration

use crate::core::types::{Address, MemoryError, MemoryResult, ModuleInfo};
use crate::windows::types::Handle;
use crate::windows::utils::{last_error_code, wide_to_string};
use std::mem;
use std::path::PathBuf;
use tracing::debug;
use winapi::shared::minwindef::{DWORD, FALSE, HMODULE, MAX_PATH};
use winapi::um::psapi::{
    EnumProcessModulesEx, GetModuleBaseNameW, GetModuleFileNameExW, GetModuleInformation,
    LIST_MODULES_ALL, MODULEINFO,
};

/// Safe wrapper for EnumProcessModulesEx, listing 32- and 64-bit modules
pub fn enum_process_modules(handle: &Handle) -> MemoryResult<Vec<HMODULE>> {
    let mut modules: Vec<HMODULE> = vec![std::ptr::null_mut(); 256];

    loop {
        let capacity = (modules.len() * mem::size_of::<HMODULE>()) as DWORD;
        let mut bytes_needed: DWORD = 0;
        let ok = unsafe {
            EnumProcessModulesEx(
                handle.raw(),
                modules.as_mut_ptr(),
                capacity,
                &mut bytes_needed,
                LIST_MODULES_ALL,
            )
        };
        if ok == FALSE {
            return Err(MemoryError::unknown(
                "EnumProcessModulesEx failed",
                Some(last_error_code()),
            ));
        }

        let count = bytes_needed as usize / mem::size_of::<HMODULE>();
        if bytes_needed <= capacity {
            modules.truncate(count);
            return Ok(modules);
        }
        // The module list grew between calls; retry with the reported size
        modules.resize(count, std::ptr::null_mut());
    }
}

/// Safe wrapper for GetModuleInformation
pub fn module_information(handle: &Handle, module: HMODULE) -> MemoryResult<MODULEINFO> {
    let mut info = MODULEINFO {
        lpBaseOfDll: std::ptr::null_mut(),
        SizeOfImage: 0,
        EntryPoint: std::ptr::null_mut(),
    };

    let ok = unsafe {
        GetModuleInformation(
            handle.raw(),
            module,
            &mut info,
            mem::size_of::<MODULEINFO>() as DWORD,
        )
    };
    if ok == FALSE {
        return Err(MemoryError::unknown(
            "GetModuleInformation failed",
            Some(last_error_code()),
        ));
    }
    Ok(info)
}

/// Safe wrapper for GetModuleBaseNameW
pub fn module_base_name(handle: &Handle, module: HMODULE) -> MemoryResult<String> {
    let mut buffer = [0u16; MAX_PATH];
    let length = unsafe {
        GetModuleBaseNameW(handle.raw(), module, buffer.as_mut_ptr(), MAX_PATH as DWORD)
    };
    if length == 0 {
        return Err(MemoryError::unknown(
            "GetModuleBaseNameW failed",
            Some(last_error_code()),
        ));
    }
    Ok(wide_to_string(&buffer[..length as usize]))
}

/// Safe wrapper for GetModuleFileNameExW
pub fn module_file_name(handle: &Handle, module: HMODULE) -> MemoryResult<PathBuf> {
    let mut buffer = [0u16; MAX_PATH];
    let length = unsafe {
        GetModuleFileNameExW(handle.raw(), module, buffer.as_mut_ptr(), MAX_PATH as DWORD)
    };
    if length == 0 {
        return Err(MemoryError::unknown(
            "GetModuleFileNameExW failed",
            Some(last_error_code()),
        ));
    }
    Ok(PathBuf::from(wide_to_string(&buffer[..length as usize])))
}

/// Every module loaded in the target, with name, path, base and image size
///
/// A module that unloads while the table is being read is left out.
pub fn loaded_modules(handle: &Handle) -> MemoryResult<Vec<ModuleInfo>> {
    let modules = enum_process_modules(handle)?;
    Ok(collect_modules(modules, |module| {
        let info = module_information(handle, module)?;
        let name = module_base_name(handle, module)?;
        let mut entry = ModuleInfo::new(
            name,
            Address::new(info.lpBaseOfDll as usize as u64),
            info.SizeOfImage as u64,
        );
        // Paths can be unavailable for protected images; the name is enough
        if let Ok(path) = module_file_name(handle, module) {
            entry.path = path;
        }
        Ok(entry)
    }))
}

/// Describes each module, skipping the ones whose lookup fails
fn collect_modules<M, F>(modules: impl IntoIterator<Item = M>, mut describe: F) -> Vec<ModuleInfo>
where
    F: FnMut(M) -> MemoryResult<ModuleInfo>,
{
    modules
        .into_iter()
        .filter_map(|module| match describe(module) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping module: {}", e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windows::kernel32;
    use winapi::um::processthreadsapi::GetCurrentProcessId;

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_own_modules_listed() {
        let pid = unsafe { GetCurrentProcessId() };
        let handle = kernel32::open_process(pid, 0x0400 | 0x0010).unwrap();
        let modules = loaded_modules(&handle).unwrap();
        assert!(!modules.is_empty());
        assert!(modules
            .iter()
            .any(|m| m.name.eq_ignore_ascii_case("kernel32.dll")));
    }

    #[test]
    fn test_failed_module_lookup_is_skipped() {
        let modules = collect_modules(0..4u64, |i| {
            if i == 2 {
                return Err(MemoryError::unknown("GetModuleBaseNameW failed", None));
            }
            Ok(ModuleInfo::new(
                format!("mod{i}.dll"),
                Address::new(0x10000 * (i + 1)),
                0x1000,
            ))
        });
        let names: Vec<_> = modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["mod0.dll", "mod1.dll", "mod3.dll"]);
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_null_handle_fails() {
        assert!(enum_process_modules(&Handle::null()).is_err());
    }
}
