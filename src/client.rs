//! The client: attach to an editor, discover its buffer, write into it.

use tracing::{info, warn};

use crate::buffer::{BufferDescriptor, BufferSize, Coordinate};
use crate::config::{CreationPolicy, EditorProfile, OwnershipPolicy};
use crate::discovery::{self, Handshake, HandshakeWait};
use crate::error::{ClientError, Result};
use crate::platform::{Platform, ProcessId, WindowHandle};
use crate::progress::{Milestone, ProgressSink};

/// How a [`Client`] attaches, what it targets, and what it does at teardown.
pub struct ClientOptions {
    pub creation: CreationPolicy,
    pub ownership: OwnershipPolicy,
    pub profile: EditorProfile,
    pub wait: HandshakeWait,
    pub progress: Option<Box<dyn ProgressSink>>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            creation: CreationPolicy::default(),
            ownership: OwnershipPolicy::default(),
            profile: EditorProfile::default(),
            wait: HandshakeWait::default(),
            progress: None,
        }
    }
}

impl ClientOptions {
    pub const fn with_creation(mut self, creation: CreationPolicy) -> Self {
        self.creation = creation;
        self
    }

    pub const fn with_ownership(mut self, ownership: OwnershipPolicy) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn with_profile(mut self, profile: EditorProfile) -> Self {
        self.profile = profile;
        self
    }

    pub const fn with_wait(mut self, wait: HandshakeWait) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }
}

/// Exclusive connection to one editor process.
///
/// Not meant to share a target with another client: two handshakes against the
/// same editor interleave their markers.
pub struct Client<P: Platform> {
    platform: P,
    options: ClientOptions,
    process: P::Process,
    pid: ProcessId,
    created: bool,
    window: Option<WindowHandle>,
    descriptor: Option<BufferDescriptor>,
}

impl<P: Platform> Client<P> {
    /// Attach to (or start) the editor and discover its buffer.
    ///
    /// # Errors
    /// Any error from [`Client::attach`] or [`Client::discover`].
    pub fn connect(platform: P, options: ClientOptions) -> Result<Self> {
        let mut client = Self::attach(platform, options)?;
        client.discover()?;
        Ok(client)
    }

    /// Obtain the editor process according to the creation policy.
    ///
    /// # Errors
    /// Returns [`ClientError::ProcessNotFound`] when creation is disabled and no
    /// instance is running, or a host error when starting or opening fails.
    pub fn attach(platform: P, options: ClientOptions) -> Result<Self> {
        let name = options.profile.process_name.clone();
        let existing = match options.creation {
            CreationPolicy::Always => None,
            CreationPolicy::IfNotFound | CreationPolicy::Never => platform.find_process(&name),
        };

        let (pid, created) = match (existing, options.creation) {
            (Some(pid), _) => (pid, false),
            (None, CreationPolicy::Never) => return Err(ClientError::ProcessNotFound(name)),
            (None, _) => (platform.spawn_process(&options.profile.program)?, true),
        };
        let process = platform.open_process(pid)?;

        let client = Self {
            platform,
            options,
            process,
            pid,
            created,
            window: None,
            descriptor: None,
        };
        client.report(if created {
            Milestone::ProcessStarted { name, pid }
        } else {
            Milestone::ProcessFound { name, pid }
        });
        Ok(client)
    }

    /// Run the marker handshake and remember where the buffer lives.
    ///
    /// On failure the client stays attached but unusable for writes; calling
    /// this again plants a fresh marker.
    ///
    /// # Errors
    /// Returns [`ClientError::WindowNotFound`], [`ClientError::BufferNotFound`]
    /// or a host error from posting input.
    pub fn discover(&mut self) -> Result<&BufferDescriptor> {
        self.descriptor = None;
        let profile = &self.options.profile;
        let window = match self.window {
            Some(window) => window,
            None => {
                let window = discovery::wait_for_window(
                    &self.platform,
                    self.pid,
                    &profile.class_name,
                    profile.window_timeout,
                )?;
                discovery::fit_window(&self.platform, window, profile.window_size);
                self.window = Some(window);
                window
            }
        };

        let handshake = Handshake {
            platform: &self.platform,
            process: &self.process,
            window,
            profile,
            wait: self.options.wait,
        };
        let progress = self.options.progress.as_deref();
        let descriptor = handshake.run(&mut rand::thread_rng(), &mut |milestone| {
            emit(progress, &milestone);
        })?;
        Ok(self.descriptor.insert(descriptor))
    }

    /// Linear cell offset of `(x, y)`. Coordinates are not validated.
    pub const fn offset(&self, x: usize, y: usize) -> usize {
        self.options.profile.buffer_size.offset(x, y)
    }

    pub const fn offset_of(&self, position: Coordinate) -> usize {
        self.offset(position.x, position.y)
    }

    /// Write `data` into the editor buffer starting at cell `offset`.
    ///
    /// The write goes straight into the target's memory with no
    /// acknowledgement and no read-back.
    ///
    /// # Errors
    /// Returns [`ClientError::NotInitialized`] before a successful discovery,
    /// [`ClientError::Bounds`] when the text would run past the buffer (nothing
    /// is written), or a host error from the write itself.
    pub fn write(&self, data: &str, offset: usize) -> Result<()> {
        let descriptor = self.descriptor.as_ref().ok_or(ClientError::NotInitialized)?;
        let bytes = self.options.profile.encoding.encode(data);
        let request = descriptor.plan_access(offset, bytes.len())?;
        self.platform
            .write_memory(&self.process, request.address, &bytes)
    }

    /// Read `characters` cells starting at `offset` back out of the buffer.
    ///
    /// # Errors
    /// Same bounds and initialization rules as [`Client::write`].
    pub fn read(&self, offset: usize, characters: usize) -> Result<String> {
        let descriptor = self.descriptor.as_ref().ok_or(ClientError::NotInitialized)?;
        let len = characters
            .checked_mul(descriptor.bytes_per_char())
            .unwrap_or(usize::MAX);
        let request = descriptor.plan_access(offset, len)?;
        let bytes = self
            .platform
            .read_memory(&self.process, request.address, request.len)?;
        Ok(self.options.profile.encoding.decode(&bytes))
    }

    /// Whether the editor process is still running.
    pub fn is_alive(&self) -> bool {
        self.platform.is_running(&self.process)
    }

    pub const fn descriptor(&self) -> Option<&BufferDescriptor> {
        self.descriptor.as_ref()
    }

    pub const fn buffer_size(&self) -> BufferSize {
        self.options.profile.buffer_size
    }

    pub const fn process_id(&self) -> ProcessId {
        self.pid
    }

    /// Whether this client started the process rather than attaching to it.
    pub const fn created_process(&self) -> bool {
        self.created
    }

    pub const fn window(&self) -> Option<WindowHandle> {
        self.window
    }

    pub const fn platform(&self) -> &P {
        &self.platform
    }

    fn report(&self, milestone: Milestone) {
        emit(self.options.progress.as_deref(), &milestone);
    }
}

fn emit(progress: Option<&dyn ProgressSink>, milestone: &Milestone) {
    info!(%milestone, "progress");
    if let Some(sink) = progress {
        sink.report(&milestone.to_string());
    }
}

impl<P: Platform> Drop for Client<P> {
    fn drop(&mut self) {
        if !self.options.ownership.should_terminate(self.created) {
            return;
        }
        if !self.platform.is_running(&self.process) {
            return;
        }
        info!(pid = self.pid, "terminating editor process");
        if let Err(err) = self.platform.terminate_process(&self.process) {
            warn!(pid = self.pid, error = %err, "failed to terminate editor process");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::TextEncoding;
    use crate::platform::fake::{FakePlatform, FakeWindow};
    use crate::platform::{Protection, RegionState};
    use std::time::Duration;

    fn options() -> ClientOptions {
        ClientOptions::default()
            .with_wait(HandshakeWait::Fixed(Duration::ZERO))
            .with_profile(EditorProfile {
                window_timeout: Duration::ZERO,
                ..EditorProfile::default()
            })
    }

    fn running_notepad() -> FakePlatform {
        FakePlatform::new()
            .with_process(7, "notepad.exe")
            .with_window(FakeWindow::top_level(1, 7, "Notepad"))
            .with_window(FakeWindow::child_of(2, 1, 7, "Edit"))
            .with_region(0x10_0000, 0x4000, RegionState::Committed, Protection::READWRITE)
            .with_editor_echo(2, 0x10_0100, TextEncoding::Utf16Le)
    }

    #[test]
    fn test_write_before_discovery_is_not_initialized() {
        let client = Client::attach(running_notepad(), options()).unwrap();
        assert!(matches!(
            client.write("hi", 0),
            Err(ClientError::NotInitialized)
        ));
        assert!(matches!(client.read(0, 1), Err(ClientError::NotInitialized)));
    }

    #[test]
    fn test_attach_only_policy_without_process_fails() {
        let result = Client::attach(
            FakePlatform::new(),
            options().with_creation(CreationPolicy::Never),
        );
        assert!(matches!(result, Err(ClientError::ProcessNotFound(name)) if name == "notepad"));
    }

    #[test]
    fn test_offset_uses_profile_width() {
        let client = Client::attach(running_notepad(), options()).unwrap();
        assert_eq!(client.offset(5, 0), 5);
        assert_eq!(client.offset_of(Coordinate::new(1, 2)), 263);
    }

    #[test]
    fn test_connect_then_write_and_read_back() {
        let client = Client::connect(running_notepad(), options()).unwrap();
        let descriptor = *client.descriptor().unwrap();
        assert_eq!(descriptor.base_address(), 0x10_0100);
        assert_eq!(descriptor.capacity(), 7860);

        client.write("Hi", 3928).unwrap();
        assert_eq!(client.read(3928, 2).unwrap(), "Hi");
        assert_eq!(
            client.platform().peek(0x10_0100 + 7856, 4).unwrap(),
            vec![b'H', 0, b'i', 0]
        );
        assert!(matches!(
            client.write("Hi", 3929),
            Err(ClientError::Bounds { .. })
        ));
    }
}
