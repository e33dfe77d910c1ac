//! In-memory host for exercising discovery without a real process.
//!
//! Windows are kept in z-order, regions in address order. An optional editor
//! echo mimics a text control by appending each posted character to a region,
//! which lets the full marker handshake run against plain memory.

use std::collections::HashSet;
use std::io;
use std::sync::{Mutex, MutexGuard};

use crate::encoding::TextEncoding;
use crate::error::{ClientError, Result};

use super::{MemoryRegion, Platform, Protection, ProcessId, RegionState, WindowHandle};

/// A window known to the fake host.
#[derive(Debug, Clone)]
pub struct FakeWindow {
    pub handle: WindowHandle,
    pub pid: ProcessId,
    pub class_name: String,
    /// Top-level windows have no parent and take part in z-order enumeration.
    pub parent: Option<WindowHandle>,
    pub origin: (i32, i32),
    pub size: (i32, i32),
}

impl FakeWindow {
    pub fn top_level(handle: usize, pid: ProcessId, class_name: &str) -> Self {
        Self {
            handle: WindowHandle(handle),
            pid,
            class_name: class_name.to_string(),
            parent: None,
            origin: (0, 0),
            size: (640, 480),
        }
    }

    pub fn child_of(handle: usize, parent: usize, pid: ProcessId, class_name: &str) -> Self {
        Self {
            parent: Some(WindowHandle(parent)),
            ..Self::top_level(handle, pid, class_name)
        }
    }
}

#[derive(Debug)]
struct FakeRegion {
    info: MemoryRegion,
    bytes: Vec<u8>,
    readable: bool,
}

#[derive(Debug, Clone, Copy)]
struct Echo {
    window: WindowHandle,
    address: usize,
    cursor: usize,
    encoding: TextEncoding,
}

#[derive(Debug, Default)]
struct FakeState {
    processes: Vec<(ProcessId, String)>,
    terminated: HashSet<ProcessId>,
    spawned: Vec<String>,
    next_pid: ProcessId,
    windows: Vec<FakeWindow>,
    regions: Vec<FakeRegion>,
    reads: Vec<usize>,
    posted: Vec<(WindowHandle, u16)>,
    echo: Option<Echo>,
    /// Memory reads left before queued characters reach the echo region.
    echo_lag: usize,
    echo_queue: Vec<u16>,
    spawn_window_class: Option<String>,
}

impl FakeState {
    fn region_mut(&mut self, address: usize, len: usize) -> Option<(&mut FakeRegion, usize)> {
        self.regions.iter_mut().find_map(|r| {
            let start = address.checked_sub(r.info.base)?;
            (start.checked_add(len)? <= r.bytes.len()).then_some((r, start))
        })
    }

    /// Append one character at the echo cursor. A full edit control drops it.
    fn echo_unit(&mut self, unit: u16) {
        let Some(echo) = self.echo else {
            return;
        };
        let ch = char::from_u32(u32::from(unit)).unwrap_or(char::REPLACEMENT_CHARACTER);
        let bytes = echo.encoding.encode(ch.encode_utf8(&mut [0; 4]));
        let Some(address) = echo.address.checked_add(echo.cursor) else {
            return;
        };
        if let Some((region, start)) = self.region_mut(address, bytes.len()) {
            region.bytes[start..start + bytes.len()].copy_from_slice(&bytes);
            if let Some(e) = self.echo.as_mut() {
                e.cursor += bytes.len();
            }
        }
    }

    /// Count one memory read against the echo lag, applying the queue once it runs out.
    fn tick_echo(&mut self) {
        if self.echo_queue.is_empty() {
            return;
        }
        if self.echo_lag > 0 {
            self.echo_lag -= 1;
            return;
        }
        for unit in std::mem::take(&mut self.echo_queue) {
            self.echo_unit(unit);
        }
    }
}

/// A scriptable [`Platform`].
#[derive(Debug)]
pub struct FakePlatform {
    state: Mutex<FakeState>,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`FakePlatform::open_process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeProcess {
    pub pid: ProcessId,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_pid: 1000,
                ..FakeState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register a running process.
    pub fn with_process(self, pid: ProcessId, name: &str) -> Self {
        self.state().processes.push((pid, name.to_string()));
        self
    }

    /// Append a window. Top-level windows enumerate in insertion order.
    pub fn with_window(self, window: FakeWindow) -> Self {
        self.state().windows.push(window);
        self
    }

    /// Add a zero-filled region. Regions must not overlap.
    pub fn with_region(
        self,
        base: usize,
        size: usize,
        state: RegionState,
        protection: Protection,
    ) -> Self {
        self.with_region_bytes(base, vec![0; size], state, protection)
    }

    /// Add a region with explicit contents.
    pub fn with_region_bytes(
        self,
        base: usize,
        bytes: Vec<u8>,
        state: RegionState,
        protection: Protection,
    ) -> Self {
        {
            let mut st = self.state();
            st.regions.push(FakeRegion {
                info: MemoryRegion {
                    base,
                    size: bytes.len(),
                    state,
                    protection,
                },
                bytes,
                readable: true,
            });
            st.regions.sort_by_key(|r| r.info.base);
        }
        self
    }

    /// Make reads of the region at `base` fail.
    pub fn with_unreadable_region(self, base: usize) -> Self {
        if let Some(region) = self.state().regions.iter_mut().find(|r| r.info.base == base) {
            region.readable = false;
        }
        self
    }

    /// Characters posted to `window` are written to memory starting at `address`.
    pub fn with_editor_echo(self, window: usize, address: usize, encoding: TextEncoding) -> Self {
        self.state().echo = Some(Echo {
            window: WindowHandle(window),
            address,
            cursor: 0,
            encoding,
        });
        self
    }

    /// Hold echoed characters back until `reads` memory reads have happened,
    /// like an editor that has not drained its message queue yet.
    pub fn with_echo_lag(self, reads: usize) -> Self {
        self.state().echo_lag = reads;
        self
    }

    /// When set, spawning a process also creates a top-level window of this
    /// class with handle equal to the new pid.
    pub fn with_spawn_window(self, class_name: &str) -> Self {
        self.state().spawn_window_class = Some(class_name.to_string());
        self
    }

    /// Base addresses of every region read so far, in order.
    pub fn reads(&self) -> Vec<usize> {
        self.state().reads.clone()
    }

    /// Every character posted so far.
    pub fn posted(&self) -> Vec<(WindowHandle, u16)> {
        self.state().posted.clone()
    }

    /// Programs launched through [`Platform::spawn_process`].
    pub fn spawned(&self) -> Vec<String> {
        self.state().spawned.clone()
    }

    pub fn was_terminated(&self, pid: ProcessId) -> bool {
        self.state().terminated.contains(&pid)
    }

    pub fn window_size(&self, window: usize) -> Option<(i32, i32)> {
        self.state()
            .windows
            .iter()
            .find(|w| w.handle.0 == window)
            .map(|w| w.size)
    }

    /// Copy `len` bytes at `address` without logging a read.
    pub fn peek(&self, address: usize, len: usize) -> Option<Vec<u8>> {
        let st = self.state();
        let (region, start) = locate(&st.regions, address, len)?;
        Some(region.bytes[start..start + len].to_vec())
    }
}

fn locate(regions: &[FakeRegion], address: usize, len: usize) -> Option<(&FakeRegion, usize)> {
    regions.iter().find_map(|r| {
        let start = address.checked_sub(r.info.base)?;
        (start.checked_add(len)? <= r.bytes.len()).then_some((r, start))
    })
}

fn fake_error(message: &str) -> io::Error {
    io::Error::other(message.to_string())
}

impl Platform for FakePlatform {
    type Process = FakeProcess;

    fn find_process(&self, name: &str) -> Option<ProcessId> {
        let st = self.state();
        st.processes
            .iter()
            .find(|(pid, n)| !st.terminated.contains(pid) && super::process_name_matches(n, name))
            .map(|(pid, _)| *pid)
    }

    fn spawn_process(&self, program: &str) -> Result<ProcessId> {
        let mut st = self.state();
        let pid = st.next_pid;
        st.next_pid += 1;
        st.processes.push((pid, program.to_string()));
        st.spawned.push(program.to_string());
        if let Some(class_name) = st.spawn_window_class.clone() {
            st.windows
                .push(FakeWindow::top_level(pid as usize, pid, &class_name));
        }
        Ok(pid)
    }

    fn open_process(&self, pid: ProcessId) -> Result<FakeProcess> {
        let st = self.state();
        if st.processes.iter().any(|(p, _)| *p == pid) {
            Ok(FakeProcess { pid })
        } else {
            Err(ClientError::os("open process", fake_error("no such process")))
        }
    }

    fn terminate_process(&self, process: &FakeProcess) -> Result<()> {
        self.state().terminated.insert(process.pid);
        Ok(())
    }

    fn is_running(&self, process: &FakeProcess) -> bool {
        !self.state().terminated.contains(&process.pid)
    }

    fn top_window(&self) -> Option<WindowHandle> {
        self.state()
            .windows
            .iter()
            .find(|w| w.parent.is_none())
            .map(|w| w.handle)
    }

    fn next_window(&self, window: WindowHandle) -> Option<WindowHandle> {
        let st = self.state();
        st.windows
            .iter()
            .filter(|w| w.parent.is_none())
            .skip_while(|w| w.handle != window)
            .nth(1)
            .map(|w| w.handle)
    }

    fn window_process_id(&self, window: WindowHandle) -> Option<ProcessId> {
        self.state()
            .windows
            .iter()
            .find(|w| w.handle == window)
            .map(|w| w.pid)
    }

    fn class_name(&self, window: WindowHandle) -> Option<String> {
        self.state()
            .windows
            .iter()
            .find(|w| w.handle == window)
            .map(|w| w.class_name.clone())
    }

    fn find_child(&self, parent: WindowHandle, class_name: &str) -> Option<WindowHandle> {
        self.state()
            .windows
            .iter()
            .find(|w| w.parent == Some(parent) && w.class_name.eq_ignore_ascii_case(class_name))
            .map(|w| w.handle)
    }

    fn root_window(&self, window: WindowHandle) -> Option<WindowHandle> {
        let st = self.state();
        let mut current = st.windows.iter().find(|w| w.handle == window)?;
        while let Some(parent) = current.parent {
            current = st.windows.iter().find(|w| w.handle == parent)?;
        }
        Some(current.handle)
    }

    fn window_origin(&self, window: WindowHandle) -> Option<(i32, i32)> {
        self.state()
            .windows
            .iter()
            .find(|w| w.handle == window)
            .map(|w| w.origin)
    }

    fn move_window(
        &self,
        window: WindowHandle,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<()> {
        let mut st = self.state();
        let w = st
            .windows
            .iter_mut()
            .find(|w| w.handle == window)
            .ok_or_else(|| ClientError::os("move window", fake_error("no such window")))?;
        w.origin = (x, y);
        w.size = (width, height);
        Ok(())
    }

    fn query_region(&self, _process: &FakeProcess, address: usize) -> Option<MemoryRegion> {
        let st = self.state();
        let region = st
            .regions
            .iter()
            .find(|r| address >= r.info.base && r.info.end().is_none_or(|end| address < end));
        if let Some(region) = region {
            return Some(region.info);
        }
        // Gaps between regions report as free, like a real address space.
        let next = st.regions.iter().find(|r| r.info.base > address)?;
        Some(MemoryRegion {
            base: address,
            size: next.info.base - address,
            state: RegionState::Free,
            protection: Protection::NOACCESS,
        })
    }

    fn read_memory(&self, _process: &FakeProcess, address: usize, len: usize) -> Result<Vec<u8>> {
        let mut st = self.state();
        st.reads.push(address);
        st.tick_echo();
        match locate(&st.regions, address, len) {
            Some((region, start)) if region.readable => {
                Ok(region.bytes[start..start + len].to_vec())
            }
            _ => Err(ClientError::os("read process memory", fake_error("access denied"))),
        }
    }

    fn write_memory(&self, _process: &FakeProcess, address: usize, bytes: &[u8]) -> Result<()> {
        let mut st = self.state();
        let Some((region, start)) = st.region_mut(address, bytes.len()) else {
            return Err(ClientError::os(
                "write process memory",
                fake_error("address not mapped"),
            ));
        };
        region.bytes[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn post_char(&self, window: WindowHandle, unit: u16) -> Result<()> {
        let mut st = self.state();
        st.posted.push((window, unit));
        if !st.echo.is_some_and(|e| e.window == window) {
            return Ok(());
        }
        if st.echo_lag > 0 {
            st.echo_queue.push(unit);
        } else {
            st.echo_unit(unit);
        }
        Ok(())
    }
}
