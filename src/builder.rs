//! Builder pattern for `SessionRecorder`.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use crate::pipeline::IngressQueue;
use crate::session::SessionRecorder;
use crate::source::SourceDescriptor;
use crate::{event_callback, EventCallback, RecorderConfig, RecorderError, RecorderEvent};

/// Builder for registering sources and creating a [`SessionRecorder`].
///
/// Use [`SessionRecorder::builder()`] to create a new builder.
///
/// # Example
///
/// ```no_run
/// use session_recorder::{ColorDepth, LoopMode, Row, SessionRecorder, SourceDescriptor};
///
/// # async fn run() -> Result<(), session_recorder::RecorderError> {
/// let recorder = SessionRecorder::builder("recordings")
///     .register_source(SourceDescriptor::streaming("cam", 640, 480, ColorDepth::Gray)?)
///     .register_source(SourceDescriptor::tabular("log")?)
///     .build()?;
///
/// recorder.start(LoopMode::PerSourceLoop).await?;
/// recorder.enqueue("log", Row::new(["42", "17"]))?;
/// recorder.stop().await?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub struct SessionRecorderBuilder {
    /// Directory under which each session creates its own subdirectory.
    root: PathBuf,
    /// Registered sources, in registration order.
    sources: Vec<SourceDescriptor>,
    /// Event callback.
    event_callback: Option<EventCallback>,
    /// Recorder configuration.
    config: RecorderConfig,
}

impl SessionRecorderBuilder {
    /// Creates a builder that records under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sources: Vec::new(),
            event_callback: None,
            config: RecorderConfig::default(),
        }
    }

    /// Registers a source. Names must be unique; this is checked by
    /// [`build()`](Self::build).
    pub fn register_source(mut self, descriptor: SourceDescriptor) -> Self {
        self.sources.push(descriptor);
        self
    }

    /// Set a callback to receive runtime events.
    ///
    /// Events include session start/stop, rejected items, and sink close results.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(RecorderEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Set custom recorder configuration.
    pub fn with_config(mut self, config: RecorderConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates the builder configuration.
    fn validate(&self) -> Result<(), RecorderError> {
        if self.sources.is_empty() {
            return Err(RecorderError::NoSourcesConfigured);
        }

        if self.config.frame_rate == 0 {
            return Err(RecorderError::InvalidConfig {
                reason: "frame_rate must be at least 1".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for descriptor in &self.sources {
            if !seen.insert(descriptor.name()) {
                return Err(RecorderError::DuplicateSource {
                    name: descriptor.name().to_string(),
                });
            }
        }

        Ok(())
    }

    /// Creates the recorder with one ingress queue per source.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No sources are registered
    /// - Two sources share a name
    /// - The configured frame rate is zero
    pub fn build(self) -> Result<SessionRecorder, RecorderError> {
        self.validate()?;

        let queues: HashMap<_, _> = self
            .sources
            .iter()
            .map(|descriptor| (descriptor.name().clone(), Arc::new(IngressQueue::new())))
            .collect();

        tracing::debug!(
            "session recorder built with {} sources under {}",
            self.sources.len(),
            self.root.display()
        );

        Ok(SessionRecorder::new(
            self.root,
            self.sources,
            queues,
            self.config,
            self.event_callback,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ColorDepth;

    fn cam() -> SourceDescriptor {
        SourceDescriptor::streaming("cam", 8, 8, ColorDepth::Gray).unwrap()
    }

    #[test]
    fn test_builder_default() {
        let builder = SessionRecorderBuilder::new("out");
        assert!(builder.sources.is_empty());
        assert!(builder.event_callback.is_none());
        assert_eq!(builder.config.frame_rate, 20);
    }

    #[test]
    fn test_builder_register_sources() {
        let builder = SessionRecorder::builder("out")
            .register_source(cam())
            .register_source(SourceDescriptor::tabular("log").unwrap());

        assert_eq!(builder.sources.len(), 2);
        assert!(builder.validate().is_ok());
    }

    #[test]
    fn test_builder_rejects_duplicate_names() {
        let builder = SessionRecorder::builder("out")
            .register_source(cam())
            .register_source(SourceDescriptor::tabular("cam").unwrap());

        let result = builder.validate();
        assert!(matches!(
            result,
            Err(RecorderError::DuplicateSource { ref name }) if name == "cam"
        ));
    }

    #[test]
    fn test_builder_rejects_no_sources() {
        let result = SessionRecorder::builder("out").build();
        assert!(matches!(result, Err(RecorderError::NoSourcesConfigured)));
    }

    #[test]
    fn test_builder_with_config() {
        let builder = SessionRecorder::builder("out").with_config(RecorderConfig {
            frame_rate: 30,
            ..Default::default()
        });
        assert_eq!(builder.config.frame_rate, 30);
    }

    #[test]
    fn test_builder_rejects_zero_frame_rate() {
        let result = SessionRecorder::builder("out")
            .register_source(cam())
            .with_config(RecorderConfig {
                frame_rate: 0,
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(RecorderError::InvalidConfig { .. })));
    }

    #[test]
    fn test_build_creates_a_queue_per_source() {
        let recorder = SessionRecorder::builder("out")
            .register_source(cam())
            .register_source(SourceDescriptor::tabular("log").unwrap())
            .build()
            .unwrap();

        assert_eq!(recorder.sources().len(), 2);
        assert_eq!(recorder.queued("cam").unwrap(), 0);
        assert_eq!(recorder.queued("log").unwrap(), 0);
        assert!(recorder.queued("mic").is_err());
    }
}
