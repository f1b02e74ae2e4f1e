//! Runtime events for monitoring a recording session.
//!
//! Events are non-fatal notifications. Recording continues after any of them
//! is emitted; they're for logging and metrics, not error handling.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::LoopMode;
use crate::source::SourceId;

/// Runtime events emitted by a [`SessionRecorder`](crate::SessionRecorder).
///
/// # Example
///
/// ```
/// use session_recorder::RecorderEvent;
///
/// fn handle_event(event: RecorderEvent) {
///     match event {
///         RecorderEvent::SessionStarted { directory, mode } => {
///             eprintln!("recording into {} ({:?})", directory.display(), mode);
///         }
///         RecorderEvent::ItemRejected { source_id, error } => {
///             eprintln!("{source_id}: dropped item: {error}");
///         }
///         RecorderEvent::SinkClosed { source_id, items_written } => {
///             eprintln!("{source_id}: closed after {items_written} items");
///         }
///         RecorderEvent::SinkError { source_id, error } => {
///             eprintln!("{source_id}: sink error: {error}");
///         }
///         RecorderEvent::SessionStopped { directory, items_written } => {
///             eprintln!("{} done, {items_written} items", directory.display());
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    /// A session directory was created and its drain loops are running.
    SessionStarted {
        /// The new session directory.
        directory: PathBuf,
        /// Loop layout used for streaming sources.
        mode: LoopMode,
    },

    /// A single item was skipped because its sink refused it.
    ///
    /// The loop carries on with the next item.
    ItemRejected {
        /// Source the item was queued on.
        source_id: SourceId,
        /// Why the sink refused it.
        error: String,
    },

    /// A sink finished and released its artifact.
    SinkClosed {
        /// Source whose sink closed.
        source_id: SourceId,
        /// Items persisted during the session.
        items_written: u64,
    },

    /// A sink failed while flushing or closing its artifact.
    SinkError {
        /// Source whose sink failed.
        source_id: SourceId,
        /// Description of the error.
        error: String,
    },

    /// `stop()` completed; every artifact is closed.
    SessionStopped {
        /// The finished session directory.
        directory: PathBuf,
        /// Items persisted across all sources.
        items_written: u64,
    },
}

/// Callback type for receiving runtime events.
///
/// Register one via [`SessionRecorderBuilder::on_event()`].
///
/// [`SessionRecorderBuilder::on_event()`]: crate::SessionRecorderBuilder::on_event
pub type EventCallback = Arc<dyn Fn(RecorderEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use session_recorder::{event_callback, RecorderEvent};
///
/// let callback = event_callback(|event: RecorderEvent| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(RecorderEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_event_debug() {
        let event = RecorderEvent::SinkClosed {
            source_id: SourceId::new("cam"),
            items_written: 10,
        };
        let debug = format!("{event:?}");
        assert!(debug.contains("SinkClosed"));
        assert!(debug.contains("10"));
    }

    #[test]
    fn test_event_callback_helper() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let callback = event_callback(move |_| {
            called_clone.store(true, Ordering::SeqCst);
        });

        callback(RecorderEvent::ItemRejected {
            source_id: SourceId::new("cam"),
            error: "bad frame".to_string(),
        });
        assert!(called.load(Ordering::SeqCst));
    }
}
