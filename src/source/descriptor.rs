//! Static description of a source: its name and kind-specific parameters.

use std::fmt;

use super::SourceId;
use crate::RecorderError;

/// Pixel layout of a streaming source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorDepth {
    /// One 8-bit luma channel per pixel.
    #[default]
    Gray,
    /// Three 8-bit channels per pixel, in RGB order.
    Color,
}

impl ColorDepth {
    /// Bytes per pixel.
    pub fn channels(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Color => 3,
        }
    }
}

impl fmt::Display for ColorDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gray => f.write_str("gray"),
            Self::Color => f.write_str("color"),
        }
    }
}

/// Frame geometry of a streaming source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingParams {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Channel layout of every frame.
    pub color_depth: ColorDepth,
}

impl StreamingParams {
    /// Number of bytes in one frame with this geometry.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * self.color_depth.channels()
    }
}

/// Kind of a source, with the parameters that only make sense for that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Frames persisted continuously into a video container.
    Streaming(StreamingParams),
    /// Rows accumulated during the session and written once at stop.
    Tabular,
}

/// Immutable metadata identifying one producer.
///
/// # Example
///
/// ```
/// use session_recorder::{ColorDepth, SourceDescriptor};
///
/// let cam = SourceDescriptor::streaming("cam", 64, 48, ColorDepth::Gray)?;
/// let log = SourceDescriptor::tabular("log")?;
/// assert!(cam.is_streaming());
/// assert_eq!(log.file_name(), "log.csv");
/// # Ok::<(), session_recorder::RecorderError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    name: SourceId,
    kind: SourceKind,
}

impl SourceDescriptor {
    /// Describes a streaming source producing `width` x `height` frames.
    ///
    /// # Errors
    ///
    /// [`RecorderError::InvalidSource`] if the name is unusable or either
    /// dimension is zero.
    pub fn streaming(
        name: impl Into<SourceId>,
        width: u32,
        height: u32,
        color_depth: ColorDepth,
    ) -> Result<Self, RecorderError> {
        let name = name.into();
        validate_name(&name)?;
        if width == 0 || height == 0 {
            return Err(RecorderError::invalid_source(
                name.as_str(),
                format!("frame dimensions must be non-zero, got {width}x{height}"),
            ));
        }
        Ok(Self {
            name,
            kind: SourceKind::Streaming(StreamingParams {
                width,
                height,
                color_depth,
            }),
        })
    }

    /// Describes a tabular source.
    ///
    /// # Errors
    ///
    /// [`RecorderError::InvalidSource`] if the name is unusable.
    pub fn tabular(name: impl Into<SourceId>) -> Result<Self, RecorderError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            name,
            kind: SourceKind::Tabular,
        })
    }

    /// The source name.
    pub fn name(&self) -> &SourceId {
        &self.name
    }

    /// The source kind and its parameters.
    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    /// Frame geometry, for streaming sources.
    pub fn streaming_params(&self) -> Option<&StreamingParams> {
        match &self.kind {
            SourceKind::Streaming(params) => Some(params),
            SourceKind::Tabular => None,
        }
    }

    /// Returns `true` for streaming sources.
    pub fn is_streaming(&self) -> bool {
        matches!(self.kind, SourceKind::Streaming(_))
    }

    /// File extension of the artifact written for this source.
    pub fn extension(&self) -> &'static str {
        match self.kind {
            SourceKind::Streaming(_) => "avi",
            SourceKind::Tabular => "csv",
        }
    }

    /// File name of the artifact inside the session directory.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.extension())
    }
}

/// Names double as file stems, so they must be non-empty and free of path syntax.
fn validate_name(name: &SourceId) -> Result<(), RecorderError> {
    let s = name.as_str();
    if s.trim().is_empty() {
        return Err(RecorderError::invalid_source(s, "name must not be empty"));
    }
    if s == "." || s == ".." || s.contains(['/', '\\', '\0']) {
        return Err(RecorderError::invalid_source(
            s,
            "name must be usable as a file name",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_descriptor() {
        let desc = SourceDescriptor::streaming("cam", 64, 48, ColorDepth::Gray).unwrap();
        assert_eq!(desc.name().as_str(), "cam");
        assert!(desc.is_streaming());
        let params = desc.streaming_params().unwrap();
        assert_eq!(params.width, 64);
        assert_eq!(params.height, 48);
        assert_eq!(params.frame_len(), 64 * 48);
        assert_eq!(desc.file_name(), "cam.avi");
    }

    #[test]
    fn test_color_frame_len() {
        let desc = SourceDescriptor::streaming("rgb", 4, 2, ColorDepth::Color).unwrap();
        assert_eq!(desc.streaming_params().unwrap().frame_len(), 24);
    }

    #[test]
    fn test_tabular_descriptor() {
        let desc = SourceDescriptor::tabular("log").unwrap();
        assert!(!desc.is_streaming());
        assert!(desc.streaming_params().is_none());
        assert_eq!(desc.kind(), &SourceKind::Tabular);
        assert_eq!(desc.file_name(), "log.csv");
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        let result = SourceDescriptor::streaming("cam", 0, 48, ColorDepth::Gray);
        assert!(matches!(result, Err(RecorderError::InvalidSource { .. })));

        let result = SourceDescriptor::streaming("cam", 64, 0, ColorDepth::Color);
        assert!(matches!(result, Err(RecorderError::InvalidSource { .. })));
    }

    #[test]
    fn test_rejects_bad_names() {
        for name in ["", "  ", ".", "..", "a/b", "a\\b"] {
            let result = SourceDescriptor::tabular(name);
            assert!(
                matches!(result, Err(RecorderError::InvalidSource { .. })),
                "name {name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_color_depth_channels() {
        assert_eq!(ColorDepth::Gray.channels(), 1);
        assert_eq!(ColorDepth::Color.channels(), 3);
        assert_eq!(ColorDepth::Color.to_string(), "color");
    }
}
