//! Error types for session-recorder.
//!
//! Errors are split into two categories:
//! - **Recorder errors** ([`RecorderError`]): returned from the recorder API.
//!   Failures in `start()` leave no partial session running.
//! - **Sink errors** ([`SinkError`]): raised by a single [`Sink`](crate::Sink).
//!   Inside a drain loop these are logged and surfaced via
//!   [`EventCallback`](crate::EventCallback); the loop keeps going.

use std::path::PathBuf;

use crate::source::ColorDepth;

/// Errors returned by [`SessionRecorder`](crate::SessionRecorder) and its builder.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// A source descriptor failed validation.
    #[error("invalid source '{name}': {reason}")]
    InvalidSource {
        /// Name given to the descriptor.
        name: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Two descriptors share the same name.
    #[error("duplicate source name: {name}")]
    DuplicateSource {
        /// The duplicated name.
        name: String,
    },

    /// `build()` was called without any registered source.
    #[error("no sources configured - use register_source() before build()")]
    NoSourcesConfigured,

    /// The recorder configuration cannot back a session (e.g. a zero frame rate).
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with it.
        reason: String,
    },

    /// `enqueue` or a lookup named a source that was never registered.
    #[error("unknown source: {name}")]
    UnknownSource {
        /// The name that was looked up.
        name: String,
    },

    /// `start()` was called while a session is recording.
    #[error("a session is already recording")]
    AlreadyRecording,

    /// The session directory could not be created.
    #[error("failed to create session directory {path}: {source}")]
    DirectoryCreate {
        /// Directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A sink could not be opened during `start()`.
    #[error("sink for source '{source_name}' failed to open: {error}")]
    SinkOpen {
        /// Source whose sink failed.
        source_name: String,
        /// Why the sink failed to open.
        #[source]
        error: SinkError,
    },

    /// An artifact could not be flushed or closed during `stop()`.
    #[error("sink for source '{source_name}' failed to flush: {error}")]
    Flush {
        /// Source whose artifact failed.
        source_name: String,
        /// The sink failure.
        #[source]
        error: SinkError,
    },
}

impl RecorderError {
    pub(crate) fn invalid_source(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSource {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur within a [`Sink`](crate::Sink) implementation.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The descriptor parameters cannot back a sink (e.g. zero dimensions).
    #[error("invalid sink parameters: {reason}")]
    InvalidParameters {
        /// Description of the bad parameter.
        reason: String,
    },

    /// A frame's declared geometry differs from the source descriptor.
    #[error(
        "frame is {width}x{height} {depth}, sink expects {expected_width}x{expected_height} {expected_depth}"
    )]
    FrameMismatch {
        /// Width registered for the source.
        expected_width: u32,
        /// Height registered for the source.
        expected_height: u32,
        /// Color depth registered for the source.
        expected_depth: ColorDepth,
        /// Width declared by the frame.
        width: u32,
        /// Height declared by the frame.
        height: u32,
        /// Color depth declared by the frame.
        depth: ColorDepth,
    },

    /// A frame's pixel buffer does not match its declared size.
    #[error("frame buffer holds {actual} bytes, declared geometry needs {expected}")]
    MalformedFrame {
        /// Bytes required by width, height and depth.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },

    /// The item kind does not belong to this sink (a row sent to a video sink or vice versa).
    #[error("unexpected item: sink accepts {expected}, got {found}")]
    UnexpectedItem {
        /// Item kind the sink accepts.
        expected: &'static str,
        /// Item kind that was received.
        found: &'static str,
    },

    /// Encoding the item failed.
    #[error("encode failed: {reason}")]
    Encode {
        /// Description of what went wrong.
        reason: String,
    },

    /// File I/O error.
    #[error("file error: {path}: {source}")]
    FileError {
        /// Path to the file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The sink was written to after `close()`.
    #[error("sink already closed")]
    Closed,

    /// A previous write failed partway; the artifact is no longer consistent
    /// and the sink refuses further items.
    #[error("sink disabled after failed write: {reason}")]
    Poisoned {
        /// The write failure that disabled the sink.
        reason: String,
    },

    /// The container reached its maximum size. Items already written are
    /// kept and `close()` still finalizes the file.
    #[error("container full: {limit} byte limit reached")]
    ContainerFull {
        /// Size limit of the container format in bytes.
        limit: u64,
    },

    /// Custom error for user-implemented sinks.
    #[error("{0}")]
    Custom(String),
}

impl SinkError {
    /// Creates a custom sink error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Creates a file error for the given path.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileError {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the error rejects a malformed item rather than
    /// reporting a failure of the sink itself.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::FrameMismatch { .. } | Self::MalformedFrame { .. } | Self::UnexpectedItem { .. }
        )
    }

    /// Returns `true` if the sink cannot accept any further item, so the
    /// items behind this one should stay queued.
    pub fn halts_sink(&self) -> bool {
        matches!(
            self,
            Self::FileError { .. } | Self::Poisoned { .. } | Self::ContainerFull { .. } | Self::Closed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_source_display() {
        let err = RecorderError::UnknownSource {
            name: "cam".to_string(),
        };
        assert_eq!(err.to_string(), "unknown source: cam");
    }

    #[test]
    fn test_frame_mismatch_display() {
        let err = SinkError::FrameMismatch {
            expected_width: 64,
            expected_height: 48,
            expected_depth: ColorDepth::Gray,
            width: 32,
            height: 32,
            depth: ColorDepth::Gray,
        };
        assert_eq!(
            err.to_string(),
            "frame is 32x32 gray, sink expects 64x48 gray"
        );
    }

    #[test]
    fn test_rejection_classification() {
        assert!(SinkError::MalformedFrame {
            expected: 10,
            actual: 9
        }
        .is_rejection());
        assert!(SinkError::UnexpectedItem {
            expected: "frame",
            found: "row"
        }
        .is_rejection());
        assert!(!SinkError::Closed.is_rejection());
        assert!(!SinkError::custom("boom").is_rejection());
    }

    #[test]
    fn test_halting_classification() {
        assert!(SinkError::ContainerFull { limit: 1 }.halts_sink());
        assert!(SinkError::Poisoned {
            reason: "disk full".to_string()
        }
        .halts_sink());
        assert!(SinkError::Closed.halts_sink());
        assert!(!SinkError::custom("boom").halts_sink());
        assert!(!SinkError::Encode {
            reason: "bad".to_string()
        }
        .halts_sink());
        assert!(!SinkError::UnexpectedItem {
            expected: "frame",
            found: "row"
        }
        .halts_sink());
    }

    #[test]
    fn test_sink_open_carries_source() {
        use std::error::Error;

        let err = RecorderError::SinkOpen {
            source_name: "cam".to_string(),
            error: SinkError::file_error(
                "/tmp/cam.avi",
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            ),
        };
        assert!(err.to_string().contains("cam"));
        assert!(err.source().is_some());
    }
}
