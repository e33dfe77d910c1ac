// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. buffer::BufferSize)
    clippy::module_name_repetitions
)]

//! # notepad-gui
//!
//! Draw into a running Notepad by writing straight into its text buffer.
//!
//! The editor never says where its characters live, so the client finds out:
//! - Resolve the editor's `Edit` window from its process id
//! - Type a random marker into it with synthetic keystrokes
//! - Scan the process's read-write memory for the marker's bytes
//!
//! Once found, any cell of the buffer can be overwritten directly.
//!
//! ## Modules
//!
//! - [`client`]: Attach, discover, write, and teardown policy
//! - [`discovery`]: The marker handshake
//! - [`scanner`]: Region walking and byte-pattern search
//! - [`window`]: Window resolution by process and class
//! - [`buffer`]: Buffer geometry and bounds-checked addressing
//! - [`encoding`]: Fixed-width text encodings
//! - [`platform`]: Host capabilities (Win32, in-memory fake)
//! - [`config`]: Policies, editor profile, and rc-file flags
//! - [`progress`]: Optional progress sink

pub mod buffer;
pub mod client;
pub mod config;
pub mod discovery;
pub mod encoding;
pub mod error;
pub mod platform;
pub mod progress;
pub mod scanner;
pub mod window;

pub use error::{ClientError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::buffer::{BufferDescriptor, BufferSize, Coordinate};
    pub use crate::client::{Client, ClientOptions};
    pub use crate::config::{CreationPolicy, EditorProfile, OwnershipPolicy};
    pub use crate::discovery::HandshakeWait;
    pub use crate::error::{ClientError, Result};
    pub use crate::platform::Platform;
}
