//! Items that producers enqueue: frames for streaming sources, rows for tabular ones.

use std::sync::Arc;

use crate::source::ColorDepth;

/// One streaming item: a row-major 8-bit pixel buffer with its declared geometry.
///
/// Pixels are stored in an `Arc<Vec<u8>>` so a frame can be cloned without
/// copying the buffer.
///
/// # Example
///
/// ```
/// use session_recorder::{ColorDepth, Frame};
///
/// let frame = Frame::filled(64, 48, ColorDepth::Gray, 128);
/// assert_eq!(frame.pixels.len(), 64 * 48);
/// assert!(frame.is_consistent());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Channel layout.
    pub depth: ColorDepth,
    /// Row-major pixel data, `width * height * depth.channels()` bytes.
    pub pixels: Arc<Vec<u8>>,
}

impl Frame {
    /// Creates a frame from raw pixels.
    ///
    /// The buffer length is not checked here; sinks reject inconsistent frames.
    pub fn new(width: u32, height: u32, depth: ColorDepth, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            depth,
            pixels: Arc::new(pixels),
        }
    }

    /// Creates a grayscale frame.
    pub fn gray(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self::new(width, height, ColorDepth::Gray, pixels)
    }

    /// Creates an RGB frame.
    pub fn color(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self::new(width, height, ColorDepth::Color, pixels)
    }

    /// Creates a frame with every byte set to `value`.
    pub fn filled(width: u32, height: u32, depth: ColorDepth, value: u8) -> Self {
        let len = width as usize * height as usize * depth.channels();
        Self::new(width, height, depth, vec![value; len])
    }

    /// Bytes required by the declared geometry.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.depth.channels()
    }

    /// Returns `true` if the buffer length matches the declared geometry.
    pub fn is_consistent(&self) -> bool {
        self.pixels.len() == self.expected_len()
    }
}

/// One tabular item: an ordered sequence of fields.
///
/// # Example
///
/// ```
/// use session_recorder::Row;
///
/// let row = Row::new(["12", "ok", "3.5"]);
/// assert_eq!(row.len(), 3);
/// assert_eq!(row.fields()[1], "ok");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row(Vec<String>);

impl Row {
    /// Creates a row from any sequence of string-like fields.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(fields.into_iter().map(Into::into).collect())
    }

    /// The fields, in order.
    pub fn fields(&self) -> &[String] {
        &self.0
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the row has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for Row {
    fn from(fields: Vec<String>) -> Self {
        Self(fields)
    }
}

impl From<Vec<&str>> for Row {
    fn from(fields: Vec<&str>) -> Self {
        Self::new(fields)
    }
}

/// Anything that can be enqueued on a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// A frame for a streaming source.
    Frame(Frame),
    /// A row for a tabular source.
    Row(Row),
}

impl Item {
    /// Short name of the item kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Frame(_) => "frame",
            Self::Row(_) => "row",
        }
    }
}

impl From<Frame> for Item {
    fn from(frame: Frame) -> Self {
        Self::Frame(frame)
    }
}

impl From<Row> for Item {
    fn from(row: Row) -> Self {
        Self::Row(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_consistency() {
        let frame = Frame::gray(4, 3, vec![0; 12]);
        assert!(frame.is_consistent());

        let frame = Frame::color(4, 3, vec![0; 12]);
        assert_eq!(frame.expected_len(), 36);
        assert!(!frame.is_consistent());
    }

    #[test]
    fn test_frame_clone_shares_pixels() {
        let frame = Frame::filled(8, 8, ColorDepth::Gray, 7);
        let copy = frame.clone();
        assert!(Arc::ptr_eq(&frame.pixels, &copy.pixels));
    }

    #[test]
    fn test_row_from_strs() {
        let row: Row = vec!["a", "b"].into();
        assert_eq!(row.fields(), &["a".to_string(), "b".to_string()]);
        assert!(!row.is_empty());
        assert!(Row::default().is_empty());
    }

    #[test]
    fn test_item_kind_name() {
        assert_eq!(Item::from(Frame::gray(1, 1, vec![0])).kind_name(), "frame");
        assert_eq!(Item::from(Row::new(["x"])).kind_name(), "row");
    }
}
