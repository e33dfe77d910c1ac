//! Host capabilities consumed by the client.
//!
//! Everything operating-system specific sits behind [`Platform`]: process
//! lookup and lifetime, window enumeration, memory introspection and synthetic
//! input. The discovery code is written once against this trait, and
//! [`native`] picks the implementation for the running host.

pub mod fake;
#[cfg(windows)]
#[allow(unsafe_code)]
mod windows;

use bitflags::bitflags;

use crate::error::Result;

/// Operating-system process identifier.
pub type ProcessId = u32;

/// Opaque reference to a host window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub usize);

/// Allocation state of a virtual-memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionState {
    Committed,
    Reserved,
    Free,
}

bitflags! {
    /// Page protection of a region, using the Win32 `PAGE_*` bit values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Protection: u32 {
        const NOACCESS = 0x001;
        const READONLY = 0x002;
        const READWRITE = 0x004;
        const WRITECOPY = 0x008;
        const EXECUTE = 0x010;
        const EXECUTE_READ = 0x020;
        const EXECUTE_READWRITE = 0x040;
        const EXECUTE_WRITECOPY = 0x080;
        const GUARD = 0x100;
        const NOCACHE = 0x200;
        const WRITECOMBINE = 0x400;
    }
}

/// One contiguous, uniformly typed span of a process address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub base: usize,
    pub size: usize,
    pub state: RegionState,
    pub protection: Protection,
}

impl MemoryRegion {
    /// Committed and protected exactly `READWRITE`: the only regions a heap
    /// character buffer can live in.
    pub fn is_scannable(&self) -> bool {
        self.state == RegionState::Committed && self.protection == Protection::READWRITE
    }

    /// First address past the region, or `None` at the top of the address space.
    pub const fn end(&self) -> Option<usize> {
        self.base.checked_add(self.size)
    }
}

/// Process, window, memory and input primitives of a host.
///
/// Calls may fail independently. Methods that only observe return `Option`;
/// methods that act return [`Result`].
pub trait Platform {
    /// An open handle to a target process, released on drop.
    type Process;

    /// First running process whose name matches `name`.
    fn find_process(&self, name: &str) -> Option<ProcessId>;

    /// Launch `program` and return its process id.
    fn spawn_process(&self, program: &str) -> Result<ProcessId>;

    /// Open a handle with read, write, query and terminate access.
    fn open_process(&self, pid: ProcessId) -> Result<Self::Process>;

    fn terminate_process(&self, process: &Self::Process) -> Result<()>;

    fn is_running(&self, process: &Self::Process) -> bool;

    /// Topmost window in z-order.
    fn top_window(&self) -> Option<WindowHandle>;

    /// The window after `window` in z-order.
    fn next_window(&self, window: WindowHandle) -> Option<WindowHandle>;

    fn window_process_id(&self, window: WindowHandle) -> Option<ProcessId>;

    fn class_name(&self, window: WindowHandle) -> Option<String>;

    /// An immediate child of `parent` whose class matches, ignoring case.
    fn find_child(&self, parent: WindowHandle, class_name: &str) -> Option<WindowHandle>;

    /// The top-level window containing `window`.
    fn root_window(&self, window: WindowHandle) -> Option<WindowHandle>;

    /// Screen position of the window's top-left corner.
    fn window_origin(&self, window: WindowHandle) -> Option<(i32, i32)>;

    fn move_window(&self, window: WindowHandle, x: i32, y: i32, width: i32, height: i32)
    -> Result<()>;

    /// Metadata of the region containing `address`, or `None` past the end of
    /// the address space.
    fn query_region(&self, process: &Self::Process, address: usize) -> Option<MemoryRegion>;

    /// Read exactly `len` bytes. Partial reads are failures.
    fn read_memory(&self, process: &Self::Process, address: usize, len: usize) -> Result<Vec<u8>>;

    fn write_memory(&self, process: &Self::Process, address: usize, bytes: &[u8]) -> Result<()>;

    /// Queue one character-input event for `window`. Fire and forget.
    fn post_char(&self, window: WindowHandle, unit: u16) -> Result<()>;
}

/// A borrowed host, so a client can run against a platform the caller keeps.
impl<P: Platform + ?Sized> Platform for &P {
    type Process = P::Process;

    fn find_process(&self, name: &str) -> Option<ProcessId> {
        (**self).find_process(name)
    }

    fn spawn_process(&self, program: &str) -> Result<ProcessId> {
        (**self).spawn_process(program)
    }

    fn open_process(&self, pid: ProcessId) -> Result<Self::Process> {
        (**self).open_process(pid)
    }

    fn terminate_process(&self, process: &Self::Process) -> Result<()> {
        (**self).terminate_process(process)
    }

    fn is_running(&self, process: &Self::Process) -> bool {
        (**self).is_running(process)
    }

    fn top_window(&self) -> Option<WindowHandle> {
        (**self).top_window()
    }

    fn next_window(&self, window: WindowHandle) -> Option<WindowHandle> {
        (**self).next_window(window)
    }

    fn window_process_id(&self, window: WindowHandle) -> Option<ProcessId> {
        (**self).window_process_id(window)
    }

    fn class_name(&self, window: WindowHandle) -> Option<String> {
        (**self).class_name(window)
    }

    fn find_child(&self, parent: WindowHandle, class_name: &str) -> Option<WindowHandle> {
        (**self).find_child(parent, class_name)
    }

    fn root_window(&self, window: WindowHandle) -> Option<WindowHandle> {
        (**self).root_window(window)
    }

    fn window_origin(&self, window: WindowHandle) -> Option<(i32, i32)> {
        (**self).window_origin(window)
    }

    fn move_window(
        &self,
        window: WindowHandle,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<()> {
        (**self).move_window(window, x, y, width, height)
    }

    fn query_region(&self, process: &Self::Process, address: usize) -> Option<MemoryRegion> {
        (**self).query_region(process, address)
    }

    fn read_memory(&self, process: &Self::Process, address: usize, len: usize) -> Result<Vec<u8>> {
        (**self).read_memory(process, address, len)
    }

    fn write_memory(&self, process: &Self::Process, address: usize, bytes: &[u8]) -> Result<()> {
        (**self).write_memory(process, address, bytes)
    }

    fn post_char(&self, window: WindowHandle, unit: u16) -> Result<()> {
        (**self).post_char(window, unit)
    }
}

#[cfg(windows)]
pub use self::windows::{NativePlatform, NativeProcess};

/// The platform implementation for the running host.
///
/// # Errors
/// Returns [`crate::ClientError::PlatformNotSupported`] on hosts without a
/// discovery strategy.
#[cfg(windows)]
pub fn native() -> Result<NativePlatform> {
    Ok(NativePlatform::new())
}

/// Stand-in platform on hosts without a discovery strategy. It has no values,
/// so a client can never be built on it.
#[cfg(not(windows))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsupported {}

#[cfg(not(windows))]
impl Platform for Unsupported {
    type Process = Self;

    fn find_process(&self, _name: &str) -> Option<ProcessId> {
        match *self {}
    }

    fn spawn_process(&self, _program: &str) -> Result<ProcessId> {
        match *self {}
    }

    fn open_process(&self, _pid: ProcessId) -> Result<Self> {
        match *self {}
    }

    fn terminate_process(&self, _process: &Self) -> Result<()> {
        match *self {}
    }

    fn is_running(&self, _process: &Self) -> bool {
        match *self {}
    }

    fn top_window(&self) -> Option<WindowHandle> {
        match *self {}
    }

    fn next_window(&self, _window: WindowHandle) -> Option<WindowHandle> {
        match *self {}
    }

    fn window_process_id(&self, _window: WindowHandle) -> Option<ProcessId> {
        match *self {}
    }

    fn class_name(&self, _window: WindowHandle) -> Option<String> {
        match *self {}
    }

    fn find_child(&self, _parent: WindowHandle, _class_name: &str) -> Option<WindowHandle> {
        match *self {}
    }

    fn root_window(&self, _window: WindowHandle) -> Option<WindowHandle> {
        match *self {}
    }

    fn window_origin(&self, _window: WindowHandle) -> Option<(i32, i32)> {
        match *self {}
    }

    fn move_window(
        &self,
        _window: WindowHandle,
        _x: i32,
        _y: i32,
        _width: i32,
        _height: i32,
    ) -> Result<()> {
        match *self {}
    }

    fn query_region(&self, _process: &Self, _address: usize) -> Option<MemoryRegion> {
        match *self {}
    }

    fn read_memory(&self, _process: &Self, _address: usize, _len: usize) -> Result<Vec<u8>> {
        match *self {}
    }

    fn write_memory(&self, _process: &Self, _address: usize, _bytes: &[u8]) -> Result<()> {
        match *self {}
    }

    fn post_char(&self, _window: WindowHandle, _unit: u16) -> Result<()> {
        match *self {}
    }
}

/// The platform implementation for the running host.
///
/// # Errors
/// Always returns [`crate::ClientError::PlatformNotSupported`] on this host.
#[cfg(not(windows))]
pub fn native() -> Result<Unsupported> {
    Err(crate::error::ClientError::PlatformNotSupported(
        std::env::consts::OS,
    ))
}

/// Whether a process name reported by the host refers to `wanted`.
///
/// Comparison ignores case and an `.exe` suffix on either side.
pub fn process_name_matches(reported: &str, wanted: &str) -> bool {
    fn stem(name: &str) -> &str {
        let split = name.len().checked_sub(4).filter(|&i| i > 0);
        match split.and_then(|i| name.get(i..).map(|ext| (i, ext))) {
            Some((i, ext)) if ext.eq_ignore_ascii_case(".exe") => &name[..i],
            _ => name,
        }
    }
    stem(reported).eq_ignore_ascii_case(stem(wanted))
}
