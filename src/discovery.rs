//! The marker handshake that locates an editor's character buffer.
//!
//! No accessor exposes where the editor keeps its text, so the address is
//! inferred: fill the editor with a random marker through synthetic
//! keystrokes, then search the process for the marker's encoded bytes.
//!
//! Posted characters are queued into the editor's own message loop and there is
//! no acknowledgement of when they are applied. [`HandshakeWait::Fixed`] keeps
//! the plain sleep-then-scan behaviour; [`HandshakeWait::Poll`] rescans until
//! the marker appears or a deadline passes.

use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info, warn};

use crate::buffer::{BufferDescriptor, BufferSize};
use crate::config::{EditorProfile, WaitMode};
use crate::error::{ClientError, Result};
use crate::platform::{Platform, WindowHandle};
use crate::progress::Milestone;
use crate::scanner;

/// Characters the marker is drawn from.
pub const MARKER_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// How to wait between planting the marker and searching for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeWait {
    /// Sleep for the given time, then scan once.
    Fixed(Duration),
    /// Scan, and keep rescanning every `interval` until `timeout` has passed.
    Poll { interval: Duration, timeout: Duration },
}

impl HandshakeWait {
    /// The five second sleep the handshake traditionally relied on.
    pub const FIXED_DEFAULT: Self = Self::Fixed(Duration::from_secs(5));

    /// Build a wait from a mode and an optional duration in milliseconds.
    ///
    /// For [`WaitMode::Fixed`] the duration is the sleep, for [`WaitMode::Poll`]
    /// it is the timeout.
    pub fn from_mode(mode: WaitMode, millis: Option<u64>) -> Self {
        match (mode, millis) {
            (WaitMode::Fixed, None) => Self::FIXED_DEFAULT,
            (WaitMode::Fixed, Some(ms)) => Self::Fixed(Duration::from_millis(ms)),
            (WaitMode::Poll, None) => Self::default(),
            (WaitMode::Poll, Some(ms)) => Self::Poll {
                interval: Duration::from_millis(250),
                timeout: Duration::from_millis(ms),
            },
        }
    }
}

impl Default for HandshakeWait {
    fn default() -> Self {
        Self::Poll {
            interval: Duration::from_millis(250),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Random marker of `len` characters from [`MARKER_ALPHABET`].
pub fn generate_marker<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(MARKER_ALPHABET[rng.gen_range(0..MARKER_ALPHABET.len())]))
        .collect()
}

/// Cell width implied by an encoded marker, assuming a fixed-width encoding.
///
/// # Errors
/// Returns [`ClientError::InvalidConfiguration`] for an empty marker or when
/// the encoding does not produce a whole number of bytes per character.
pub fn bytes_per_char(encoded_len: usize, characters: usize) -> Result<usize> {
    if characters == 0 || encoded_len % characters != 0 {
        return Err(ClientError::InvalidConfiguration(format!(
            "{encoded_len} encoded bytes for {characters} characters is not a fixed-width encoding"
        )));
    }
    Ok(encoded_len / characters)
}

/// Resolve the editor's input window, retrying until `timeout` has passed.
///
/// # Errors
/// Returns [`ClientError::WindowNotFound`] when no window shows up in time.
pub fn wait_for_window<P: Platform>(
    platform: &P,
    pid: u32,
    class_name: &str,
    timeout: Duration,
) -> Result<WindowHandle> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(window) = crate::window::resolve(platform, pid, class_name) {
            return Ok(window);
        }
        if Instant::now() >= deadline {
            return Err(ClientError::WindowNotFound {
                pid,
                class: class_name.to_string(),
            });
        }
        thread::sleep(Duration::from_millis(100));
    }
}

/// Resize the editor's top-level window so its text area spans `size` pixels.
///
/// Failures are logged and ignored: a wrongly sized window only changes what
/// is visible, not where the buffer lives.
pub fn fit_window<P: Platform>(platform: &P, window: WindowHandle, size: (i32, i32)) {
    let Some(root) = platform.root_window(window) else {
        warn!(window = window.0, "no top-level window to resize");
        return;
    };
    let (x, y) = platform.window_origin(root).unwrap_or((0, 0));
    if let Err(err) = platform.move_window(root, x, y, size.0, size.1) {
        warn!(window = root.0, error = %err, "could not resize editor window");
    }
}

/// One run of the marker handshake against an attached editor.
pub struct Handshake<'a, P: Platform> {
    pub platform: &'a P,
    pub process: &'a P::Process,
    pub window: WindowHandle,
    pub profile: &'a EditorProfile,
    pub wait: HandshakeWait,
}

impl<P: Platform> Handshake<'_, P> {
    /// Plant a marker and find it.
    ///
    /// Blocks for the whole wait and cannot be cancelled. `report` is called at
    /// each milestone.
    ///
    /// # Errors
    /// Returns [`ClientError::BufferNotFound`] when the marker never shows up,
    /// or the first error from posting input.
    pub fn run<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        report: &mut dyn FnMut(Milestone),
    ) -> Result<BufferDescriptor> {
        let size: BufferSize = self.profile.buffer_size;
        let characters = size.cell_count();
        let marker = generate_marker(rng, characters);

        report(Milestone::HandshakeStarted { characters });
        for unit in marker.encode_utf16() {
            self.platform.post_char(self.window, unit)?;
        }

        let pattern = self.profile.encoding.encode(&marker);
        let width = bytes_per_char(pattern.len(), characters)?;

        report(Milestone::HandshakeWaiting);
        let base_address = self
            .wait_for_pattern(&pattern)
            .ok_or(ClientError::BufferNotFound { characters })?;

        let descriptor = BufferDescriptor::new(base_address, width, size)?;
        info!(
            base_address,
            bytes_per_char = width,
            width = size.width,
            height = size.height,
            "editor buffer discovered"
        );
        report(Milestone::BufferFound {
            address: base_address,
        });
        Ok(descriptor)
    }

    fn wait_for_pattern(&self, pattern: &[u8]) -> Option<usize> {
        match self.wait {
            HandshakeWait::Fixed(delay) => {
                thread::sleep(delay);
                scanner::scan(self.platform, self.process, pattern)
            }
            HandshakeWait::Poll { interval, timeout } => {
                let deadline = Instant::now() + timeout;
                let mut attempt = 0u32;
                loop {
                    attempt += 1;
                    if let Some(address) = scanner::scan(self.platform, self.process, pattern) {
                        return Some(address);
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        debug!(attempt, "marker poll timed out");
                        return None;
                    }
                    debug!(attempt, "marker not visible yet");
                    thread::sleep(interval.min(deadline - now));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::TextEncoding;
    use crate::platform::fake::{FakePlatform, FakeProcess, FakeWindow};
    use crate::platform::{Protection, RegionState};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const PROCESS: FakeProcess = FakeProcess { pid: 7 };

    fn small_profile() -> EditorProfile {
        EditorProfile {
            buffer_size: BufferSize::new(8, 2),
            ..EditorProfile::default()
        }
    }

    fn no_wait() -> HandshakeWait {
        HandshakeWait::Fixed(Duration::ZERO)
    }

    #[test]
    fn test_marker_has_requested_length_and_alphabet() {
        let mut rng = StdRng::seed_from_u64(3);
        let marker = generate_marker(&mut rng, 131 * 30);
        assert_eq!(marker.chars().count(), 3930);
        assert!(marker.bytes().all(|b| MARKER_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_utf16_marker_yields_two_bytes_per_char() {
        let mut rng = StdRng::seed_from_u64(9);
        let marker = generate_marker(&mut rng, 3930);
        let encoded = TextEncoding::Utf16Le.encode(&marker);
        assert_eq!(bytes_per_char(encoded.len(), 3930).unwrap(), 2);
    }

    #[test]
    fn test_uneven_encoding_is_rejected() {
        assert!(bytes_per_char(7, 3).is_err());
        assert!(bytes_per_char(0, 0).is_err());
    }

    #[test]
    fn test_poll_wait_uses_timeout_from_millis() {
        assert_eq!(
            HandshakeWait::from_mode(WaitMode::Poll, Some(1500)),
            HandshakeWait::Poll {
                interval: Duration::from_millis(250),
                timeout: Duration::from_millis(1500),
            }
        );
        assert_eq!(
            HandshakeWait::from_mode(WaitMode::Fixed, None),
            HandshakeWait::FIXED_DEFAULT
        );
    }

    #[test]
    fn test_handshake_finds_echoed_marker() {
        let host = FakePlatform::new()
            .with_window(FakeWindow::top_level(1, 7, "Edit"))
            .with_region(0x8000, 0x100, RegionState::Committed, Protection::READWRITE)
            .with_editor_echo(1, 0x8010, TextEncoding::Utf16Le);
        let profile = small_profile();
        let handshake = Handshake {
            platform: &host,
            process: &PROCESS,
            window: WindowHandle(1),
            profile: &profile,
            wait: no_wait(),
        };
        let mut milestones = Vec::new();
        let descriptor = handshake
            .run(&mut StdRng::seed_from_u64(1), &mut |m| milestones.push(m))
            .unwrap();

        assert_eq!(descriptor.base_address(), 0x8010);
        assert_eq!(descriptor.bytes_per_char(), 2);
        assert_eq!(descriptor.capacity(), 32);
        assert_eq!(host.posted().len(), 16);
        assert_eq!(
            milestones,
            vec![
                Milestone::HandshakeStarted { characters: 16 },
                Milestone::HandshakeWaiting,
                Milestone::BufferFound { address: 0x8010 },
            ]
        );
    }

    #[test]
    fn test_handshake_without_echo_fails_with_buffer_not_found() {
        let host = FakePlatform::new()
            .with_window(FakeWindow::top_level(1, 7, "Edit"))
            .with_region(0x8000, 0x100, RegionState::Committed, Protection::READWRITE);
        let profile = small_profile();
        let handshake = Handshake {
            platform: &host,
            process: &PROCESS,
            window: WindowHandle(1),
            profile: &profile,
            wait: HandshakeWait::Poll {
                interval: Duration::from_millis(1),
                timeout: Duration::from_millis(5),
            },
        };
        let err = handshake
            .run(&mut StdRng::seed_from_u64(1), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, ClientError::BufferNotFound { characters: 16 }));
    }

    fn lagged_echo_host() -> FakePlatform {
        FakePlatform::new()
            .with_window(FakeWindow::top_level(1, 7, "Edit"))
            .with_region(0x8000, 0x100, RegionState::Committed, Protection::READWRITE)
            .with_editor_echo(1, 0x8010, TextEncoding::Utf16Le)
            .with_echo_lag(2)
    }

    fn run_on(
        host: &FakePlatform,
        profile: &EditorProfile,
        wait: HandshakeWait,
    ) -> Result<BufferDescriptor> {
        let handshake = Handshake {
            platform: host,
            process: &PROCESS,
            window: WindowHandle(1),
            profile,
            wait,
        };
        handshake.run(&mut StdRng::seed_from_u64(4), &mut |_| {})
    }

    #[test]
    fn test_poll_rescans_until_late_marker_appears() {
        let host = lagged_echo_host();
        let profile = small_profile();
        let wait = HandshakeWait::Poll {
            interval: Duration::from_millis(1),
            timeout: Duration::from_secs(2),
        };
        let descriptor = run_on(&host, &profile, wait).unwrap();
        assert_eq!(descriptor.base_address(), 0x8010);
        assert_eq!(host.reads(), vec![0x8000, 0x8000, 0x8000]);
    }

    #[test]
    fn test_fixed_wait_scans_once_and_misses_late_marker() {
        let host = lagged_echo_host();
        let profile = small_profile();
        let err = run_on(&host, &profile, no_wait()).unwrap_err();
        assert!(matches!(err, ClientError::BufferNotFound { characters: 16 }));
        assert_eq!(host.reads().len(), 1);
    }

    #[test]
    fn test_fit_window_resizes_top_level_parent() {
        let host = FakePlatform::new()
            .with_window(FakeWindow::top_level(1, 7, "Notepad"))
            .with_window(FakeWindow::child_of(2, 1, 7, "Edit"));
        fit_window(&host, WindowHandle(2), (1365, 768));
        assert_eq!(host.window_size(1), Some((1365, 768)));
    }

    #[test]
    fn test_wait_for_window_times_out() {
        let host = FakePlatform::new();
        let err = wait_for_window(&host, 7, "Edit", Duration::ZERO).unwrap_err();
        assert!(matches!(err, ClientError::WindowNotFound { pid: 7, .. }));
    }
}
