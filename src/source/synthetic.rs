//! Synthetic producers for testing without real capture hardware.
//!
//! Both generators are deterministic (a simple LCG seeded at construction), so
//! tests and demos produce the same data on every run.

use crate::item::{Frame, Row};
use crate::source::StreamingParams;

/// Fields per row produced by [`SyntheticRows::new`].
pub const DEFAULT_ROW_FIELDS: usize = 10;

const LCG_MUL: u32 = 1_103_515_245;
const LCG_INC: u32 = 12_345;

/// Bits of the frame index drawn into each synthetic frame.
const STAMP_BITS: u32 = 16;

fn next_random(seed: &mut u32) -> u32 {
    *seed = seed.wrapping_mul(LCG_MUL).wrapping_add(LCG_INC);
    *seed >> 16
}

/// Draws the low [`STAMP_BITS`] of `index` along the top-left edge, most
/// significant bit first, as square cells that are white when set.
fn stamp_index(pixels: &mut [u8], params: &StreamingParams, index: u64) {
    let width = params.width as usize;
    let height = params.height as usize;
    let channels = params.color_depth.channels();
    let cell = (width / STAMP_BITS as usize).min(height / 4).clamp(1, 8);

    for bit in 0..STAMP_BITS as usize {
        let value = if (index >> (STAMP_BITS as usize - 1 - bit)) & 1 == 1 {
            0xff
        } else {
            0
        };
        let x0 = bit * cell;
        if x0 >= width {
            break;
        }
        for y in 0..cell.min(height) {
            for x in x0..(x0 + cell).min(width) {
                let start = (y * width + x) * channels;
                pixels[start..start + channels].fill(value);
            }
        }
    }
}

/// Generates noise frames matching a streaming source's geometry.
///
/// Each frame carries its zero-based index as a row of black and white cells
/// in the top-left corner, so dropped or reordered frames show up on playback.
///
/// # Example
///
/// ```
/// use session_recorder::source::SyntheticFrames;
/// use session_recorder::{ColorDepth, SourceDescriptor};
///
/// let cam = SourceDescriptor::streaming("cam", 64, 48, ColorDepth::Gray)?;
/// let mut frames = SyntheticFrames::new(*cam.streaming_params().unwrap());
///
/// let frame = frames.next_frame();
/// assert_eq!((frame.width, frame.height), (64, 48));
/// assert_eq!(frames.take(5).count(), 5);
/// # Ok::<(), session_recorder::RecorderError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SyntheticFrames {
    params: StreamingParams,
    seed: u32,
    produced: u64,
}

impl SyntheticFrames {
    /// Creates a generator for the given geometry.
    pub fn new(params: StreamingParams) -> Self {
        Self::with_seed(params, 12_345)
    }

    /// Creates a generator with an explicit seed.
    pub fn with_seed(params: StreamingParams, seed: u32) -> Self {
        Self {
            params,
            seed,
            produced: 0,
        }
    }

    /// Number of frames generated so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Generates the next noise frame, stamped with its index.
    pub fn next_frame(&mut self) -> Frame {
        let mut pixels: Vec<u8> = (0..self.params.frame_len())
            .map(|_| (next_random(&mut self.seed) & 0xff) as u8)
            .collect();
        stamp_index(&mut pixels, &self.params, self.produced);
        self.produced += 1;
        Frame::new(
            self.params.width,
            self.params.height,
            self.params.color_depth,
            pixels,
        )
    }
}

impl Iterator for SyntheticFrames {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        Some(self.next_frame())
    }
}

/// Generates rows of random integers in `1..=100`, rendered as strings.
#[derive(Debug, Clone)]
pub struct SyntheticRows {
    fields: usize,
    seed: u32,
}

impl SyntheticRows {
    /// Creates a generator of [`DEFAULT_ROW_FIELDS`]-field rows.
    pub fn new() -> Self {
        Self::with_fields(DEFAULT_ROW_FIELDS)
    }

    /// Creates a generator of `fields`-field rows.
    pub fn with_fields(fields: usize) -> Self {
        Self {
            fields,
            seed: 54_321,
        }
    }

    /// Generates the next row.
    pub fn next_row(&mut self) -> Row {
        Row::new((0..self.fields).map(|_| (next_random(&mut self.seed) % 100 + 1).to_string()))
    }
}

impl Default for SyntheticRows {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for SyntheticRows {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        Some(self.next_row())
    }
}
