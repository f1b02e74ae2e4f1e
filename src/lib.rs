//! # session-recorder
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Multi-source session recording to per-source files.
//!
//! `session-recorder` accepts items from any number of named sources and
//! persists them into one directory per recording session: streaming sources
//! (fixed-size image frames) become Motion-JPEG AVI files written as items
//! arrive, tabular sources (rows of text fields) become CSV files written
//! once when the session stops.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use session_recorder::{ColorDepth, Frame, LoopMode, Row, SessionRecorder, SourceDescriptor};
//!
//! # async fn run() -> Result<(), session_recorder::RecorderError> {
//! let recorder = SessionRecorder::builder("recordings")
//!     .register_source(SourceDescriptor::streaming("cam", 64, 48, ColorDepth::Gray)?)
//!     .register_source(SourceDescriptor::tabular("log")?)
//!     .on_event(|e| tracing::warn!(?e, "recorder event"))
//!     .build()?;
//!
//! let dir = recorder.start(LoopMode::PerSourceLoop).await?;
//!
//! // From any thread; never waits on disk
//! recorder.enqueue("cam", Frame::filled(64, 48, ColorDepth::Gray, 128))?;
//! recorder.enqueue("log", Row::new(["42", "17"]))?;
//!
//! let report = recorder.stop().await?;
//! // dir/cam.avi and dir/log.csv are complete
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Ingress Queues**: One unbounded FIFO per source; `enqueue` only pushes
//! - **Drain Loops**: Tokio tasks that move streaming items into video sinks,
//!   one loop per source or one shared loop ([`LoopMode`])
//! - **Stop**: Raises a shared signal, waits for each loop to drain and close
//!   its files, then writes every tabular queue in one pass
//!
//! Producers are never slowed down by encoding or file I/O.

#![warn(missing_docs)]
// Container headers need intentional integer casts between sizes
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![allow(clippy::unwrap_used)]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod builder;
mod config;
mod error;
mod event;
mod item;
mod pipeline;
mod session;
mod sink;
pub mod source;

pub use builder::SessionRecorderBuilder;
pub use config::{LoopMode, RecorderConfig, TableLayout};
pub use error::{RecorderError, SinkError};
pub use event::{event_callback, EventCallback, RecorderEvent};
pub use item::{Frame, Item, Row};
pub use session::{SessionRecorder, SessionReport, SessionState, SourceReport};
pub use sink::{open_sink, Sink, TableSink, VideoSink};
pub use source::{
    ColorDepth, SourceDescriptor, SourceId, SourceKind, StreamingParams, SyntheticFrames,
    SyntheticRows,
};
