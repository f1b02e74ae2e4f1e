//! Sink trait and the two built-in sinks.
//!
//! A [`Sink`] owns the on-disk artifact of one source for one session:
//!
//! - [`VideoSink`]: appends frames to a Motion-JPEG AVI file as they arrive
//! - [`TableSink`]: buffers rows in memory and writes a CSV file on `close()`
//!
//! [`open_sink`] picks the right one for a [`SourceDescriptor`].

mod table;
mod video;

pub use table::TableSink;
pub use video::VideoSink;

use std::path::Path;

use async_trait::async_trait;

use crate::source::{SourceDescriptor, SourceKind};
use crate::{Item, RecorderConfig, SinkError};

/// Write side of one source for one session.
///
/// # Implementation Notes
///
/// - Methods take `&self`; use interior mutability if needed
/// - A sink is driven by exactly one drain loop, so calls never overlap
/// - Blocking file I/O belongs in `tokio::task::spawn_blocking`
/// - `write` after `close` must fail with [`SinkError::Closed`]
/// - `close` must be safe to call more than once
///
/// # Example
///
/// ```
/// use session_recorder::{Item, Sink, SinkError};
/// use async_trait::async_trait;
/// use std::path::Path;
///
/// struct DiscardSink;
///
/// #[async_trait]
/// impl Sink for DiscardSink {
///     fn name(&self) -> &str {
///         "discard"
///     }
///
///     fn path(&self) -> &Path {
///         Path::new("/dev/null")
///     }
///
///     async fn write(&self, _item: Item) -> Result<(), SinkError> {
///         Ok(())
///     }
///
///     async fn close(&self) -> Result<(), SinkError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Sink: Send + Sync {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Path of the artifact this sink produces.
    fn path(&self) -> &Path;

    /// Persist (or buffer) one item.
    ///
    /// Errors for which [`SinkError::is_rejection`] holds concern only this
    /// item; the sink stays usable.
    async fn write(&self, item: Item) -> Result<(), SinkError>;

    /// Flush and release the artifact.
    async fn close(&self) -> Result<(), SinkError>;
}

/// Opens the sink matching `descriptor` inside `session_dir`.
///
/// # Errors
///
/// Returns the sink's open error: invalid parameters or a file that could
/// not be created.
pub async fn open_sink(
    session_dir: &Path,
    descriptor: &SourceDescriptor,
    config: &RecorderConfig,
) -> Result<Box<dyn Sink>, SinkError> {
    match descriptor.kind() {
        SourceKind::Streaming(_) => {
            let sink = VideoSink::open(session_dir, descriptor, config).await?;
            Ok(Box::new(sink))
        }
        SourceKind::Tabular => {
            let sink = TableSink::open(session_dir, descriptor, config.table).await?;
            Ok(Box::new(sink))
        }
    }
}
