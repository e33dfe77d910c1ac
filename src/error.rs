//! Error types shared by every part of the client.

use std::io;

/// Failures raised while attaching to, discovering, or writing into an editor buffer.
///
/// None of these are retried internally. A caller that wants to retry must run
/// the whole attach/discover sequence again.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No discovery strategy exists for the host operating system.
    #[error("no buffer discovery strategy for platform `{0}`")]
    PlatformNotSupported(&'static str),

    /// Attach-only policy and no running process carried the expected name.
    #[error("no running `{0}` process and process creation is disabled")]
    ProcessNotFound(String),

    /// The attached process never exposed a window of the expected class.
    #[error("no `{class}` window owned by process {pid}")]
    WindowNotFound { pid: u32, class: String },

    /// The marker scan exhausted every region without a match.
    #[error("marker of {characters} characters not found in any read-write region")]
    BufferNotFound { characters: usize },

    /// A buffer operation was attempted before discovery succeeded.
    #[error("the client has not discovered the editor buffer yet")]
    NotInitialized,

    /// A write or read would run past the end of the buffer.
    #[error(
        "access of {len} bytes at byte offset {byte_offset} exceeds buffer capacity of {capacity} bytes"
    )]
    Bounds {
        byte_offset: usize,
        len: usize,
        capacity: usize,
    },

    /// A policy or tuning value could not be understood.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A host primitive failed.
    #[error("{operation} failed")]
    Os {
        operation: &'static str,
        #[source]
        source: io::Error,
    },
}

impl ClientError {
    /// Wrap a host failure with the name of the primitive that raised it.
    pub const fn os(operation: &'static str, source: io::Error) -> Self {
        Self::Os { operation, source }
    }

    /// Whether re-running the attach/discover sequence can possibly succeed.
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::PlatformNotSupported(_))
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_platform_errors_are_unrecoverable() {
        assert!(!ClientError::PlatformNotSupported("linux").is_recoverable());
        assert!(ClientError::NotInitialized.is_recoverable());
        assert!(ClientError::BufferNotFound { characters: 3930 }.is_recoverable());
    }

    #[test]
    fn test_bounds_message_names_capacity() {
        let err = ClientError::Bounds {
            byte_offset: 7858,
            len: 4,
            capacity: 7860,
        };
        let text = err.to_string();
        assert!(text.contains("7858"), "message should carry the byte offset: {text}");
        assert!(text.contains("7860"), "message should carry the capacity: {text}");
    }
}
