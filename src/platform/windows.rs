//! Win32 implementation of the host capabilities.

use std::ffi::c_void;
use std::io;
use std::mem;
use std::process::Command;

use sysinfo::System;
use tracing::debug;
use windows::Win32::Foundation::{CloseHandle, HANDLE, HWND, LPARAM, RECT, STILL_ACTIVE, WPARAM};
use windows::Win32::System::Diagnostics::Debug::{ReadProcessMemory, WriteProcessMemory};
use windows::Win32::System::Memory::{
    MEM_COMMIT, MEM_RESERVE, MEMORY_BASIC_INFORMATION, VirtualQueryEx,
};
use windows::Win32::System::Threading::{
    GetExitCodeProcess, OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_TERMINATE,
    PROCESS_VM_OPERATION, PROCESS_VM_READ, PROCESS_VM_WRITE, TerminateProcess,
};
use windows::Win32::UI::WindowsAndMessaging::{
    FindWindowExW, GA_ROOT, GW_HWNDNEXT, GetAncestor, GetClassNameW, GetTopWindow, GetWindow,
    GetWindowRect, GetWindowThreadProcessId, MoveWindow, PostMessageW, WM_CHAR,
};
use windows::core::{HSTRING, PCWSTR};

use crate::error::{ClientError, Result};

use super::{MemoryRegion, Platform, Protection, ProcessId, RegionState, WindowHandle};

/// Longest class name read back from a window.
const CLASS_NAME_CAPACITY: usize = 256;

fn hwnd(window: WindowHandle) -> HWND {
    HWND(window.0 as *mut c_void)
}

fn handle(hwnd: HWND) -> Option<WindowHandle> {
    (!hwnd.is_invalid()).then_some(WindowHandle(hwnd.0 as usize))
}

fn os_error(operation: &'static str, err: windows::core::Error) -> ClientError {
    ClientError::os(operation, io::Error::other(err))
}

/// An open process handle, closed on drop.
#[derive(Debug)]
pub struct NativeProcess {
    handle: HANDLE,
    pid: ProcessId,
}

impl NativeProcess {
    pub const fn pid(&self) -> ProcessId {
        self.pid
    }
}

impl Drop for NativeProcess {
    fn drop(&mut self) {
        // SAFETY: the handle came from OpenProcess and is closed exactly once.
        if let Err(err) = unsafe { CloseHandle(self.handle) } {
            debug!(pid = self.pid, error = %err, "CloseHandle failed");
        }
    }
}

/// The Win32 host.
#[derive(Debug, Default)]
pub struct NativePlatform;

impl NativePlatform {
    pub const fn new() -> Self {
        Self
    }
}

impl Platform for NativePlatform {
    type Process = NativeProcess;

    fn find_process(&self, name: &str) -> Option<ProcessId> {
        let mut system = System::new();
        system.refresh_processes();
        system
            .processes()
            .iter()
            .find(|(_, process)| super::process_name_matches(process.name(), name))
            .map(|(pid, _)| pid.as_u32())
    }

    fn spawn_process(&self, program: &str) -> Result<ProcessId> {
        let child = Command::new(program)
            .spawn()
            .map_err(|err| ClientError::os("spawn editor", err))?;
        Ok(child.id())
    }

    fn open_process(&self, pid: ProcessId) -> Result<NativeProcess> {
        let access = PROCESS_QUERY_INFORMATION
            | PROCESS_VM_READ
            | PROCESS_VM_WRITE
            | PROCESS_VM_OPERATION
            | PROCESS_TERMINATE;
        // SAFETY: plain FFI call, the returned handle is owned by NativeProcess.
        let handle = unsafe { OpenProcess(access, false, pid) }
            .map_err(|err| os_error("OpenProcess", err))?;
        Ok(NativeProcess { handle, pid })
    }

    fn terminate_process(&self, process: &NativeProcess) -> Result<()> {
        // SAFETY: the handle is open for PROCESS_TERMINATE.
        unsafe { TerminateProcess(process.handle, 1) }
            .map_err(|err| os_error("TerminateProcess", err))
    }

    fn is_running(&self, process: &NativeProcess) -> bool {
        let mut code = 0u32;
        // SAFETY: `code` outlives the call.
        let queried = unsafe { GetExitCodeProcess(process.handle, &raw mut code) };
        queried.is_ok() && code == STILL_ACTIVE.0 as u32
    }

    fn top_window(&self) -> Option<WindowHandle> {
        // SAFETY: no pointers are passed.
        unsafe { GetTopWindow(None) }.ok().and_then(handle)
    }

    fn next_window(&self, window: WindowHandle) -> Option<WindowHandle> {
        // SAFETY: stale handles make the call fail, they are not dereferenced.
        unsafe { GetWindow(hwnd(window), GW_HWNDNEXT) }
            .ok()
            .and_then(handle)
    }

    fn window_process_id(&self, window: WindowHandle) -> Option<ProcessId> {
        let mut pid = 0u32;
        // SAFETY: `pid` outlives the call.
        let thread = unsafe { GetWindowThreadProcessId(hwnd(window), Some(&raw mut pid)) };
        (thread != 0).then_some(pid)
    }

    fn class_name(&self, window: WindowHandle) -> Option<String> {
        let mut buf = [0u16; CLASS_NAME_CAPACITY];
        // SAFETY: the buffer length is passed along with the slice.
        let len = unsafe { GetClassNameW(hwnd(window), &mut buf) };
        let len = usize::try_from(len).ok().filter(|&len| len > 0)?;
        Some(String::from_utf16_lossy(&buf[..len]))
    }

    fn find_child(&self, parent: WindowHandle, class_name: &str) -> Option<WindowHandle> {
        let class = HSTRING::from(class_name);
        // SAFETY: `class` is a null-terminated wide string that outlives the call.
        unsafe {
            FindWindowExW(
                Some(hwnd(parent)),
                None,
                PCWSTR(class.as_ptr()),
                PCWSTR::null(),
            )
        }
        .ok()
        .and_then(handle)
    }

    fn root_window(&self, window: WindowHandle) -> Option<WindowHandle> {
        // SAFETY: no pointers are passed.
        handle(unsafe { GetAncestor(hwnd(window), GA_ROOT) })
    }

    fn window_origin(&self, window: WindowHandle) -> Option<(i32, i32)> {
        let mut rect = RECT::default();
        // SAFETY: `rect` outlives the call.
        unsafe { GetWindowRect(hwnd(window), &raw mut rect) }.ok()?;
        Some((rect.left, rect.top))
    }

    fn move_window(
        &self,
        window: WindowHandle,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<()> {
        // SAFETY: no pointers are passed.
        unsafe { MoveWindow(hwnd(window), x, y, width, height, true) }
            .map_err(|err| os_error("MoveWindow", err))
    }

    fn query_region(&self, process: &NativeProcess, address: usize) -> Option<MemoryRegion> {
        let mut info = MEMORY_BASIC_INFORMATION::default();
        // SAFETY: `info` is sized by the length argument and outlives the call.
        let written = unsafe {
            VirtualQueryEx(
                process.handle,
                Some(address as *const c_void),
                &raw mut info,
                mem::size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        };
        if written == 0 {
            return None;
        }
        let state = if info.State == MEM_COMMIT {
            RegionState::Committed
        } else if info.State == MEM_RESERVE {
            RegionState::Reserved
        } else {
            RegionState::Free
        };
        Some(MemoryRegion {
            base: info.BaseAddress as usize,
            size: info.RegionSize,
            state,
            protection: Protection::from_bits_retain(info.Protect.0),
        })
    }

    fn read_memory(&self, process: &NativeProcess, address: usize, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let mut read = 0usize;
        // SAFETY: `buf` holds `len` writable bytes and outlives the call.
        unsafe {
            ReadProcessMemory(
                process.handle,
                address as *const c_void,
                buf.as_mut_ptr().cast(),
                len,
                Some(&raw mut read),
            )
        }
        .map_err(|err| os_error("ReadProcessMemory", err))?;
        if read != len {
            return Err(ClientError::os(
                "ReadProcessMemory",
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("partial read of {read} of {len} bytes"),
                ),
            ));
        }
        Ok(buf)
    }

    fn write_memory(&self, process: &NativeProcess, address: usize, bytes: &[u8]) -> Result<()> {
        let mut written = 0usize;
        // SAFETY: `bytes` is readable for its full length during the call.
        unsafe {
            WriteProcessMemory(
                process.handle,
                address as *const c_void,
                bytes.as_ptr().cast(),
                bytes.len(),
                Some(&raw mut written),
            )
        }
        .map_err(|err| os_error("WriteProcessMemory", err))?;
        if written != bytes.len() {
            return Err(ClientError::os(
                "WriteProcessMemory",
                io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("partial write of {written} of {} bytes", bytes.len()),
                ),
            ));
        }
        Ok(())
    }

    fn post_char(&self, window: WindowHandle, unit: u16) -> Result<()> {
        // SAFETY: WM_CHAR carries its payload by value.
        unsafe {
            PostMessageW(
                Some(hwnd(window)),
                WM_CHAR,
                WPARAM(usize::from(unit)),
                LPARAM(0),
            )
        }
        .map_err(|err| os_error("PostMessageW", err))
    }
}
