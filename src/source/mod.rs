//! Source descriptors and synthetic producers.
//!
//! A source is identified by its [`SourceId`] and described by a
//! [`SourceDescriptor`]: either a streaming source with fixed frame geometry
//! or a tabular source. The [`synthetic`] generators stand in for real
//! producers in tests and demos.

mod descriptor;
mod source_id;
pub mod synthetic;

pub use descriptor::{ColorDepth, SourceDescriptor, SourceKind, StreamingParams};
pub use source_id::SourceId;
pub use synthetic::{SyntheticFrames, SyntheticRows};
