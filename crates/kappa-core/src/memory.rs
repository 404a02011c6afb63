//! Memory access layer
//!
//! Pointer-chain resolution over any [`MemoryAccess`], plus the live
//! implementation that reads a foreign process by name.

use crate::traits::MemoryAccess;
use kappa_common::{MemoryError, PointerWidth};
use std::ffi::OsStr;
use std::path::Path;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tracing::{debug, trace};

/// Parse a hexadecimal offset, with or without a `0x` prefix
pub fn parse_offset(offset: &str) -> Result<u64, MemoryError> {
    let trimmed = offset.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u64::from_str_radix(digits, 16).map_err(|_| MemoryError::InvalidOffset(offset.to_string()))
}

/// Parse every offset of an address chain
pub fn parse_chain(chain: &[String]) -> Result<Vec<u64>, MemoryError> {
    chain.iter().map(|offset| parse_offset(offset)).collect()
}

/// Follow a pointer chain to the address of the final value.
///
/// Starting from address 0, every offset but the last is added to the current
/// address and the pointer stored there is read. The last offset is added to
/// the final base and not dereferenced, so a single-offset chain is an
/// absolute address.
pub fn resolve_pointer_chain(
    memory: &dyn MemoryAccess,
    offsets: &[u64],
    width: PointerWidth,
) -> Result<u64, MemoryError> {
    let (last, pointers) = offsets.split_last().ok_or(MemoryError::EmptyChain)?;

    let mut current: u64 = 0;
    for offset in pointers {
        let address = current.wrapping_add(*offset);
        let bytes = memory
            .read(address, width.bytes())
            .map_err(|e| MemoryError::PointerRead {
                address,
                message: e.to_string(),
            })?;
        current = read_pointer(&bytes, width).ok_or_else(|| MemoryError::PointerRead {
            address,
            message: format!("short read of {} bytes", bytes.len()),
        })?;
        trace!(target: "kappa_core::memory", "{:#x} -> {:#x}", address, current);
    }

    Ok(current.wrapping_add(*last))
}

fn read_pointer(bytes: &[u8], width: PointerWidth) -> Option<u64> {
    match width {
        PointerWidth::Bits32 => {
            let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
            Some(u32::from_ne_bytes(raw) as u64)
        }
        PointerWidth::Bits64 => {
            let raw: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
            Some(u64::from_ne_bytes(raw))
        }
    }
}

fn stem_matches(path: &Path, target: &str) -> bool {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().eq_ignore_ascii_case(target))
        .unwrap_or(false)
}

/// Whether a running process refers to `target`, ignoring ASCII case.
///
/// Compares the process name, its file stem and the file stem of the
/// executable path. Linux truncates process names to 15 bytes, so longer
/// targets only match through the executable.
pub fn matches_target(process_name: &OsStr, exe: Option<&Path>, target: &str) -> bool {
    if process_name.to_string_lossy().eq_ignore_ascii_case(target) {
        return true;
    }
    stem_matches(Path::new(process_name), target)
        || exe.map(|exe| stem_matches(exe, target)).unwrap_or(false)
}

/// Find the PID of a running process by name
pub fn find_process(target: &str) -> Option<u32> {
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::nothing().with_exe(UpdateKind::OnlyIfNotSet),
    );

    let mut pids: Vec<u32> = system
        .processes()
        .values()
        .filter(|process| matches_target(process.name(), process.exe(), target))
        .map(|process| process.pid().as_u32())
        .collect();
    // Lowest PID first so repeated lookups pick the same process
    pids.sort_unstable();
    pids.first().copied()
}

#[cfg(windows)]
mod handle {
    use std::ffi::c_void;
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
    use windows::Win32::System::Threading::{
        OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_VM_READ,
    };

    /// Process handle opened for reading only, closed on drop
    pub(super) struct ReadHandle(HANDLE);

    // A process handle is a kernel object reference valid on any thread
    unsafe impl Send for ReadHandle {}

    impl ReadHandle {
        pub(super) fn open(pid: u32) -> Result<Self, String> {
            let handle = unsafe {
                OpenProcess(
                    PROCESS_VM_READ | PROCESS_QUERY_LIMITED_INFORMATION,
                    false,
                    pid,
                )
            }
            .map_err(|e| e.to_string())?;
            Ok(Self(handle))
        }

        pub(super) fn read(&self, address: u64, buffer: &mut [u8]) -> Result<(), String> {
            let mut read = 0usize;
            unsafe {
                ReadProcessMemory(
                    self.0,
                    address as usize as *const c_void,
                    buffer.as_mut_ptr().cast(),
                    buffer.len(),
                    Some(&mut read as *mut usize),
                )
            }
            .map_err(|e| e.to_string())?;
            if read != buffer.len() {
                return Err(format!("read {} of {} bytes", read, buffer.len()));
            }
            Ok(())
        }
    }

    impl Drop for ReadHandle {
        fn drop(&mut self) {
            if !self.0.is_invalid() {
                unsafe {
                    let _ = CloseHandle(self.0);
                }
            }
        }
    }
}

#[cfg(not(windows))]
mod handle {
    use process_memory::{CopyAddress, ProcessHandle, TryIntoProcessHandle};

    pub(super) struct ReadHandle(ProcessHandle);

    impl ReadHandle {
        pub(super) fn open(pid: u32) -> Result<Self, String> {
            (pid as process_memory::Pid)
                .try_into_process_handle()
                .map(Self)
                .map_err(|e| e.to_string())
        }

        pub(super) fn read(&self, address: u64, buffer: &mut [u8]) -> Result<(), String> {
            self.0
                .copy_address(address as usize, buffer)
                .map_err(|e| e.to_string())
        }
    }
}

/// Read handle to a live foreign process. The OS handle is released when
/// this is dropped.
pub struct ProcessMemory {
    pid: u32,
    name: String,
    handle: handle::ReadHandle,
}

impl ProcessMemory {
    /// Open the first process matching `target` for reading
    pub fn open(target: &str) -> Result<Self, MemoryError> {
        let pid = find_process(target)
            .ok_or_else(|| MemoryError::ProcessNotFound(target.to_string()))?;
        Self::open_pid(pid, target)
    }

    pub fn open_pid(pid: u32, name: &str) -> Result<Self, MemoryError> {
        let handle =
            handle::ReadHandle::open(pid).map_err(|message| MemoryError::Open { pid, message })?;
        debug!(target: "kappa_core::memory", "Opened process {} (PID {})", name, pid);
        Ok(Self {
            pid,
            name: name.to_string(),
            handle,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl MemoryAccess for ProcessMemory {
    fn read(&self, address: u64, size: usize) -> Result<Vec<u8>, MemoryError> {
        let mut buffer = vec![0u8; size];
        self.handle
            .read(address, &mut buffer)
            .map_err(|message| MemoryError::Read {
                address,
                size,
                message,
            })?;
        Ok(buffer)
    }

    fn is_alive(&self) -> bool {
        let pid = Pid::from_u32(self.pid);
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing(),
        );
        system.process(pid).is_some()
    }
}

impl std::fmt::Debug for ProcessMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessMemory")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .finish()
    }
}
