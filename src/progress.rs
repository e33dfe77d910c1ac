//! Optional text progress reporting.

use std::fmt;

use crate::platform::ProcessId;

/// Receives a line of text at each client milestone.
pub trait ProgressSink {
    fn report(&self, message: &str);
}

impl<F: Fn(&str)> ProgressSink for F {
    fn report(&self, message: &str) {
        self(message);
    }
}

/// Fixed points in the attach/discover sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Milestone {
    ProcessFound { name: String, pid: ProcessId },
    ProcessStarted { name: String, pid: ProcessId },
    HandshakeStarted { characters: usize },
    HandshakeWaiting,
    BufferFound { address: usize },
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProcessFound { name, pid } => write!(f, "Found process: {name} (PID: {pid})"),
            Self::ProcessStarted { name, pid } => write!(f, "Started process: {name} (PID: {pid})"),
            Self::HandshakeStarted { characters } => {
                write!(f, "Submitting {characters} random key presses...")
            }
            Self::HandshakeWaiting => f.write_str("Waiting for messages to process..."),
            Self::BufferFound { address } => write!(f, "Found buffer at {address:#x}"),
        }
    }
}
