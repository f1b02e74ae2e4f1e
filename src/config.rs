//! Configuration types for recording sessions.

use std::time::Duration;

/// How drain loops are laid out across streaming sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// One loop services every streaming source, one item per source per tick.
    SingleLoop,

    /// Each streaming source gets its own loop.
    #[default]
    PerSourceLoop,
}

/// Layout of the delimited table written for tabular sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayout {
    /// Field delimiter byte. Default: `b','`
    pub delimiter: u8,

    /// Emit a header record of column positions (`0,1,2,...`).
    /// Default: `true`
    pub header: bool,

    /// Prefix every record with its row number (starting at 0).
    /// The header cell for this column is empty.
    /// Default: `false`
    pub index_column: bool,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            delimiter: b',',
            header: true,
            index_column: false,
        }
    }
}

/// Configuration for a [`SessionRecorder`](crate::SessionRecorder).
///
/// Use [`RecorderConfig::default()`] for sensible defaults, or customize as needed.
///
/// # Example
///
/// ```
/// use session_recorder::RecorderConfig;
///
/// let config = RecorderConfig {
///     frame_rate: 30,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Nominal frame rate stamped into every video container.
    ///
    /// Default: 20
    pub frame_rate: u32,

    /// JPEG quality (1-100) used for each video frame.
    ///
    /// Default: 85
    pub jpeg_quality: u8,

    /// First sleep taken by a drain loop that found no work.
    ///
    /// Default: 250us
    pub idle_backoff_min: Duration,

    /// Upper bound on the idle sleep; also bounds how long `stop()` waits
    /// for a loop to notice the stop signal.
    ///
    /// Default: 5ms
    pub idle_backoff_max: Duration,

    /// Table format for tabular sources.
    pub table: TableLayout,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            frame_rate: 20,
            jpeg_quality: 85,
            idle_backoff_min: Duration::from_micros(250),
            idle_backoff_max: Duration::from_millis(5),
            table: TableLayout::default(),
        }
    }
}
