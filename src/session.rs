//! Recording session lifecycle: start, enqueue, stop.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::builder::SessionRecorderBuilder;
use crate::pipeline::{DrainLoop, IngressQueue, Lane, LaneOutcome, StopSignal};
use crate::sink::{open_sink, TableSink};
use crate::source::{SourceDescriptor, SourceId};
use crate::{EventCallback, Item, LoopMode, RecorderConfig, RecorderError, RecorderEvent, SinkError};

/// Lifecycle state of a [`SessionRecorder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Built, never started.
    Idle,
    /// Drain loops are running.
    Recording,
    /// The last session was stopped. `start()` may be called again.
    Stopped,
}

/// What one source persisted during a session.
#[derive(Debug, Clone)]
pub struct SourceReport {
    /// The source.
    pub source_id: SourceId,
    /// Artifact written for the source.
    pub path: PathBuf,
    /// Items persisted.
    pub items_written: u64,
    /// Items skipped because the sink refused them.
    pub items_rejected: u64,
}

/// Summary returned by [`SessionRecorder::stop()`].
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// The finished session directory.
    pub directory: PathBuf,
    /// One report per source, in registration order.
    pub sources: Vec<SourceReport>,
}

impl SessionReport {
    /// Looks up the report for a source by name.
    pub fn source(&self, name: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|r| r.source_id.as_str() == name)
    }

    /// Items persisted across all sources.
    pub fn items_written(&self) -> u64 {
        self.sources.iter().map(|r| r.items_written).sum()
    }
}

/// Directory and stop signal of the current (or most recent) session.
struct CurrentSession {
    directory: PathBuf,
    signal: StopSignal,
}

/// A spawned drain loop and the sources it owns.
struct LoopHandle {
    sources: Vec<SourceId>,
    handle: JoinHandle<Vec<LaneOutcome>>,
}

/// Records items from registered sources into per-session artifacts.
///
/// Streaming sources are persisted as they arrive by background drain loops;
/// tabular sources are buffered in their queue and written once at `stop()`.
///
/// # Lifecycle
///
/// 1. Created by [`SessionRecorderBuilder::build()`]
/// 2. [`start()`](Self::start) creates a session directory and spawns drain loops
/// 3. Producers call [`enqueue()`](Self::enqueue) from any thread
/// 4. [`stop()`](Self::stop) drains, closes every artifact and returns a report
/// 5. `start()` may be called again; each session gets a new directory
///
/// Dropping a recording `SessionRecorder` signals its drain loops so the
/// video files are finalized, but tabular data of that session is not written.
/// Prefer an explicit `stop()`.
///
/// `enqueue` is synchronous and never blocks on disk, so the recorder is
/// usually shared as `Arc<SessionRecorder>` between producer threads and the
/// task that drives `start`/`stop`.
pub struct SessionRecorder {
    root: PathBuf,
    sources: Vec<SourceDescriptor>,
    queues: HashMap<SourceId, Arc<IngressQueue<Item>>>,
    config: RecorderConfig,
    event_callback: Option<EventCallback>,
    state: RwLock<SessionState>,
    current: Mutex<Option<CurrentSession>>,
    // Serialises start/stop and owns the running loops.
    loops: tokio::sync::Mutex<Vec<LoopHandle>>,
}

impl SessionRecorder {
    /// Creates a new builder for registering sources.
    pub fn builder(root: impl Into<PathBuf>) -> SessionRecorderBuilder {
        SessionRecorderBuilder::new(root)
    }

    pub(crate) fn new(
        root: PathBuf,
        sources: Vec<SourceDescriptor>,
        queues: HashMap<SourceId, Arc<IngressQueue<Item>>>,
        config: RecorderConfig,
        event_callback: Option<EventCallback>,
    ) -> Self {
        Self {
            root,
            sources,
            queues,
            config,
            event_callback,
            state: RwLock::new(SessionState::Idle),
            current: Mutex::new(None),
            loops: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Registered sources, in registration order.
    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    /// Directory of the current session, or of the last one after `stop()`.
    pub fn session_directory(&self) -> Option<PathBuf> {
        self.current.lock().as_ref().map(|c| c.directory.clone())
    }

    /// Number of items waiting in a source's queue.
    ///
    /// # Errors
    ///
    /// [`RecorderError::UnknownSource`] if no source has that name.
    pub fn queued(&self, name: &str) -> Result<usize, RecorderError> {
        Ok(self.queue(name)?.len())
    }

    fn queue(&self, name: &str) -> Result<&Arc<IngressQueue<Item>>, RecorderError> {
        self.queues
            .get(name)
            .ok_or_else(|| RecorderError::UnknownSource {
                name: name.to_string(),
            })
    }

    fn emit_event(&self, event: RecorderEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }

    /// Queues an item for a source. Never blocks on a consumer.
    ///
    /// Accepted in any state: items queued while no session is recording are
    /// persisted by the next session. Whether the item fits the source (a
    /// frame of the right size, a row for a tabular source) is checked by the
    /// sink when it is drained; mismatches are skipped and reported through
    /// [`RecorderEvent::ItemRejected`].
    ///
    /// # Errors
    ///
    /// [`RecorderError::UnknownSource`] if no source has that name.
    pub fn enqueue(&self, name: &str, item: impl Into<Item>) -> Result<(), RecorderError> {
        let queue = self.queue(name)?;
        let item = item.into();
        // Held while pushing so `stop()` can't flip the state mid-push.
        let _state = self.state.read();
        queue.push(item);
        Ok(())
    }

    /// Starts a new session and returns its directory.
    ///
    /// Creates `{root}/{UTC timestamp}`, opens a video file for every streaming
    /// source and spawns drain loops laid out according to `mode`. Must be
    /// called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A session is already recording
    /// - The session directory cannot be created
    /// - A video sink fails to open (sinks opened so far are closed again and
    ///   the new session directory is removed)
    pub async fn start(&self, mode: LoopMode) -> Result<PathBuf, RecorderError> {
        let mut loops = self.loops.lock().await;
        if self.state() == SessionState::Recording {
            return Err(RecorderError::AlreadyRecording);
        }

        let directory = create_session_directory(&self.root)?;

        let mut lanes = Vec::new();
        for descriptor in self.sources.iter().filter(|d| d.is_streaming()) {
            let queue = Arc::clone(self.queue(descriptor.name().as_str())?);
            match open_sink(&directory, descriptor, &self.config).await {
                Ok(sink) => lanes.push(Lane::new(descriptor.name().clone(), queue, sink)),
                Err(error) => {
                    for lane in lanes {
                        lane.close(None).await;
                    }
                    if let Err(e) = std::fs::remove_dir_all(&directory) {
                        tracing::warn!(
                            "failed to remove {} after open failure: {}",
                            directory.display(),
                            e
                        );
                    }
                    return Err(RecorderError::SinkOpen {
                        source_name: descriptor.name().to_string(),
                        error,
                    });
                }
            }
        }

        let groups: Vec<Vec<Lane>> = match mode {
            LoopMode::SingleLoop if lanes.is_empty() => Vec::new(),
            LoopMode::SingleLoop => vec![lanes],
            LoopMode::PerSourceLoop => lanes.into_iter().map(|lane| vec![lane]).collect(),
        };

        let signal = StopSignal::new();
        {
            let mut state = self.state.write();
            for group in groups {
                let sources = group.iter().map(|lane| lane.source_id().clone()).collect();
                let drain = DrainLoop::new(
                    group,
                    signal.clone(),
                    &self.config,
                    self.event_callback.clone(),
                );
                loops.push(LoopHandle {
                    sources,
                    handle: tokio::spawn(drain.run()),
                });
            }
            *self.current.lock() = Some(CurrentSession {
                directory: directory.clone(),
                signal,
            });
            *state = SessionState::Recording;
        }

        tracing::info!(
            "recording session started in {} ({} drain loops, {:?})",
            directory.display(),
            loops.len(),
            mode
        );
        self.emit_event(RecorderEvent::SessionStarted {
            directory: directory.clone(),
            mode,
        });

        Ok(directory)
    }

    /// Stops the current session and closes every artifact.
    ///
    /// This will:
    /// 1. Raise the stop signal; later `enqueue` calls land in the next session
    /// 2. Wait for every drain loop to write what was queued and close its file
    /// 3. Write the queued rows of each tabular source to its table file
    ///
    /// Returns `Ok(None)` if no session is recording.
    ///
    /// # Errors
    ///
    /// [`RecorderError::Flush`] for the first artifact that failed to close.
    /// Every other artifact is still closed first.
    pub async fn stop(&self) -> Result<Option<SessionReport>, RecorderError> {
        let mut loops = self.loops.lock().await;

        let directory = {
            let mut state = self.state.write();
            if *state != SessionState::Recording {
                return Ok(None);
            }
            *state = SessionState::Stopped;
            let current = self.current.lock();
            let Some(current) = current.as_ref() else {
                return Ok(None);
            };
            current.signal.raise();
            current.directory.clone()
        };

        tracing::info!("stopping recording session in {}", directory.display());

        let mut reports = Vec::with_capacity(self.sources.len());
        let mut first_error: Option<RecorderError> = None;
        let mut record_error = |source_id: &SourceId, error: SinkError| {
            if first_error.is_none() {
                first_error = Some(RecorderError::Flush {
                    source_name: source_id.to_string(),
                    error,
                });
            }
        };

        let (sources, handles): (Vec<_>, Vec<_>) = loops
            .drain(..)
            .map(|l| (l.sources, l.handle))
            .unzip();
        let results = futures::future::join_all(handles).await;

        for (sources, result) in sources.into_iter().zip(results) {
            match result {
                Ok(outcomes) => {
                    for outcome in outcomes {
                        if let Some(error) = outcome.close_error {
                            record_error(&outcome.report.source_id, error);
                        }
                        reports.push(outcome.report);
                    }
                }
                Err(e) => {
                    tracing::error!("drain loop for {:?} failed: {}", sources, e);
                    if let Some(source_id) = sources.first() {
                        record_error(source_id, SinkError::custom(format!("drain loop failed: {e}")));
                    }
                }
            }
        }

        let events = self.event_callback.as_ref();
        for descriptor in self.sources.iter().filter(|d| !d.is_streaming()) {
            let queue = Arc::clone(self.queue(descriptor.name().as_str())?);
            match TableSink::open(&directory, descriptor, self.config.table).await {
                Ok(sink) => {
                    let mut lane = Lane::new(descriptor.name().clone(), queue, Box::new(sink));
                    lane.drain_queue(events).await;
                    let outcome = lane.close(events).await;
                    if let Some(error) = outcome.close_error {
                        record_error(&outcome.report.source_id, error);
                    }
                    reports.push(outcome.report);
                }
                Err(error) => {
                    // Rows stay queued for the next session.
                    tracing::warn!(source = %descriptor.name(), error = %error, "failed to open table file");
                    self.emit_event(RecorderEvent::SinkError {
                        source_id: descriptor.name().clone(),
                        error: error.to_string(),
                    });
                    record_error(descriptor.name(), error);
                }
            }
        }

        reports.sort_by_key(|report| {
            self.sources
                .iter()
                .position(|d| d.name() == &report.source_id)
        });
        let report = SessionReport {
            directory,
            sources: reports,
        };

        tracing::info!(
            "recording session stopped: {} items written to {}",
            report.items_written(),
            report.directory.display()
        );
        self.emit_event(RecorderEvent::SessionStopped {
            directory: report.directory.clone(),
            items_written: report.items_written(),
        });

        match first_error {
            Some(error) => Err(error),
            None => Ok(Some(report)),
        }
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        if *self.state.get_mut() == SessionState::Recording {
            if let Some(current) = self.current.get_mut() {
                // Loops close their video files on their own
                current.signal.raise();
                tracing::warn!(
                    "session recorder dropped while recording; tabular data for {} is not written",
                    current.directory.display()
                );
            }
        }
    }
}

/// Creates `{root}/{UTC timestamp}`, suffixing `-1`, `-2`, ... on collision.
fn create_session_directory(root: &Path) -> Result<PathBuf, RecorderError> {
    std::fs::create_dir_all(root).map_err(|source| RecorderError::DirectoryCreate {
        path: root.to_path_buf(),
        source,
    })?;

    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string();
    let mut suffix = 0u32;
    loop {
        let name = if suffix == 0 {
            stamp.clone()
        } else {
            format!("{stamp}-{suffix}")
        };
        let path = root.join(name);
        match std::fs::create_dir(&path) {
            Ok(()) => return Ok(path),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => suffix += 1,
            Err(source) => return Err(RecorderError::DirectoryCreate { path, source }),
        }
    }
}
