//! Motion-JPEG AVI sink for streaming sources.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use tokio::sync::Mutex;

use crate::sink::Sink;
use crate::source::{ColorDepth, SourceDescriptor, StreamingParams};
use crate::{Frame, Item, RecorderConfig, SinkError};

// AVI (RIFF) layout constants
// See: https://learn.microsoft.com/en-us/windows/win32/directshow/avi-riff-file-reference

/// Byte offset of the RIFF chunk size.
const AVI_RIFF_SIZE_OFFSET: u64 = 4;

/// Byte offset of `dwTotalFrames` in the main AVI header.
const AVI_TOTAL_FRAMES_OFFSET: u64 = 48;

/// Byte offset of `dwLength` in the video stream header.
const AVI_STREAM_LENGTH_OFFSET: u64 = 140;

/// Byte offset of the `movi` LIST size.
const AVI_MOVI_SIZE_OFFSET: u64 = 216;

/// Size of everything before the first frame chunk.
const AVI_HEADER_SIZE: u32 = 224;

/// Size of the `hdrl` LIST payload (`hdrl` + `avih` chunk + `strl` LIST).
const AVI_HDRL_SIZE: u32 = 192;

/// Size of the `strl` LIST payload (`strl` + `strh` chunk + `strf` chunk).
const AVI_STRL_SIZE: u32 = 116;

/// Payload size of the `avih` main header chunk.
const AVI_MAIN_HEADER_SIZE: u32 = 56;

/// Payload size of the `strh` stream header chunk.
const AVI_STREAM_HEADER_SIZE: u32 = 56;

/// Payload size of the `strf` chunk (a `BITMAPINFOHEADER`).
const BITMAP_INFO_HEADER_SIZE: u32 = 40;

/// Largest file a 32-bit RIFF size field can describe.
const AVI_MAX_FILE_SIZE: u64 = u32::MAX as u64;

/// `avih` flag: the file carries an `idx1` index.
const AVIF_HASINDEX: u32 = 0x10;

/// `idx1` flag: the chunk is a keyframe (every MJPEG frame is).
const AVIIF_KEYFRAME: u32 = 0x10;

/// Chunk id of a compressed video frame on stream 0.
const FRAME_CHUNK_ID: &[u8; 4] = b"00dc";

/// Size of one `idx1` entry.
const INDEX_ENTRY_SIZE: u32 = 16;

/// A sink that writes frames to a Motion-JPEG AVI file.
///
/// The file and its headers are created by [`open`](VideoSink::open); each
/// frame is JPEG-encoded and appended as it arrives; `close()` writes the
/// index and patches the frame counts and chunk sizes. All file I/O runs in
/// the blocking thread pool.
///
/// Frames must match the registered width, height and color depth exactly.
/// Mismatches are rejected with [`SinkError::FrameMismatch`] and leave the
/// file untouched.
///
/// A write that fails partway disables the sink: later writes and `close()`
/// return [`SinkError::Poisoned`], since chunk offsets could no longer be
/// trusted. Reaching the RIFF size limit returns [`SinkError::ContainerFull`];
/// the frames written so far are still finalized by `close()`.
pub struct VideoSink {
    name: String,
    path: Arc<PathBuf>,
    params: StreamingParams,
    quality: u8,
    state: Arc<Mutex<VideoState>>,
}

struct VideoState<W = BufWriter<File>> {
    writer: Option<W>,
    index: Vec<IndexEntry>,
    /// Bytes in the `movi` LIST payload, counted from the `movi` fourcc.
    movi_len: u64,
    /// Set when a chunk write failed partway.
    poisoned: Option<String>,
}

impl<W> VideoState<W> {
    fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
            index: Vec::new(),
            movi_len: 4,
            poisoned: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    offset: u32,
    size: u32,
}

impl VideoSink {
    /// Creates `{session_dir}/{name}.avi` and writes the container headers.
    ///
    /// # Errors
    ///
    /// - [`SinkError::InvalidParameters`] if the descriptor is not a streaming
    ///   source, has a zero dimension, or the frame rate is zero
    /// - [`SinkError::FileError`] if the file cannot be created
    pub async fn open(
        session_dir: &Path,
        descriptor: &SourceDescriptor,
        config: &RecorderConfig,
    ) -> Result<Self, SinkError> {
        let params = *descriptor
            .streaming_params()
            .ok_or_else(|| SinkError::InvalidParameters {
                reason: format!("source '{}' is not a streaming source", descriptor.name()),
            })?;
        if params.width == 0 || params.height == 0 {
            return Err(SinkError::InvalidParameters {
                reason: format!(
                    "frame dimensions must be non-zero, got {}x{}",
                    params.width, params.height
                ),
            });
        }
        if config.frame_rate == 0 {
            return Err(SinkError::InvalidParameters {
                reason: "frame rate must be non-zero".to_string(),
            });
        }

        let path = Arc::new(session_dir.join(descriptor.file_name()));
        let frame_rate = config.frame_rate;
        let create_path = Arc::clone(&path);

        let writer = tokio::task::spawn_blocking(move || {
            let file =
                File::create(&*create_path).map_err(|e| SinkError::file_error(&*create_path, e))?;
            let mut writer = BufWriter::new(file);
            Self::write_avi_header(&mut writer, &params, frame_rate)
                .map_err(|e| SinkError::file_error(&*create_path, e))?;
            Ok::<_, SinkError>(writer)
        })
        .await
        .map_err(|e| SinkError::custom(format!("open task panicked: {e}")))??;

        tracing::debug!(
            "VideoSink {}: opened {} ({}x{} {}, {} fps)",
            descriptor.name(),
            path.display(),
            params.width,
            params.height,
            params.color_depth,
            frame_rate
        );

        Ok(Self {
            name: descriptor.name().to_string(),
            path,
            params,
            quality: config.jpeg_quality.clamp(1, 100),
            state: Arc::new(Mutex::new(VideoState::new(writer))),
        })
    }

    /// Number of frames appended so far.
    pub async fn frames_written(&self) -> usize {
        self.state.lock().await.index.len()
    }

    /// Writes the RIFF header, `hdrl` list and the opening of the `movi` list.
    ///
    /// Frame counts and the RIFF/`movi` sizes are placeholders until `close()`.
    fn write_avi_header(
        writer: &mut impl Write,
        params: &StreamingParams,
        frame_rate: u32,
    ) -> std::io::Result<()> {
        let frame_len = u32::try_from(params.frame_len()).unwrap_or(u32::MAX);
        let width = i32::try_from(params.width).unwrap_or(i32::MAX);
        let height = i32::try_from(params.height).unwrap_or(i32::MAX);
        let bit_count: u16 = match params.color_depth {
            ColorDepth::Gray => 8,
            ColorDepth::Color => 24,
        };

        // RIFF container header
        writer.write_all(b"RIFF")?;
        writer.write_all(&(AVI_HEADER_SIZE - 8).to_le_bytes())?;
        writer.write_all(b"AVI ")?;

        writer.write_all(b"LIST")?;
        writer.write_all(&AVI_HDRL_SIZE.to_le_bytes())?;
        writer.write_all(b"hdrl")?;

        // avih: main header
        writer.write_all(b"avih")?;
        writer.write_all(&AVI_MAIN_HEADER_SIZE.to_le_bytes())?;
        writer.write_all(&(1_000_000 / frame_rate).to_le_bytes())?;
        writer.write_all(&frame_len.saturating_mul(frame_rate).to_le_bytes())?;
        writer.write_all(&0u32.to_le_bytes())?; // padding granularity
        writer.write_all(&AVIF_HASINDEX.to_le_bytes())?;
        writer.write_all(&0u32.to_le_bytes())?; // total frames
        writer.write_all(&0u32.to_le_bytes())?; // initial frames
        writer.write_all(&1u32.to_le_bytes())?; // streams
        writer.write_all(&frame_len.to_le_bytes())?;
        writer.write_all(&params.width.to_le_bytes())?;
        writer.write_all(&params.height.to_le_bytes())?;
        writer.write_all(&[0u8; 16])?;

        writer.write_all(b"LIST")?;
        writer.write_all(&AVI_STRL_SIZE.to_le_bytes())?;
        writer.write_all(b"strl")?;

        // strh: video stream header
        writer.write_all(b"strh")?;
        writer.write_all(&AVI_STREAM_HEADER_SIZE.to_le_bytes())?;
        writer.write_all(b"vids")?;
        writer.write_all(b"MJPG")?;
        writer.write_all(&0u32.to_le_bytes())?; // flags
        writer.write_all(&0u16.to_le_bytes())?; // priority
        writer.write_all(&0u16.to_le_bytes())?; // language
        writer.write_all(&0u32.to_le_bytes())?; // initial frames
        writer.write_all(&1u32.to_le_bytes())?; // scale
        writer.write_all(&frame_rate.to_le_bytes())?; // rate
        writer.write_all(&0u32.to_le_bytes())?; // start
        writer.write_all(&0u32.to_le_bytes())?; // length
        writer.write_all(&frame_len.to_le_bytes())?;
        writer.write_all(&u32::MAX.to_le_bytes())?; // quality: driver default
        writer.write_all(&0u32.to_le_bytes())?; // sample size
        writer.write_all(&0i16.to_le_bytes())?;
        writer.write_all(&0i16.to_le_bytes())?;
        writer.write_all(&i16::try_from(params.width).unwrap_or(i16::MAX).to_le_bytes())?;
        writer.write_all(&i16::try_from(params.height).unwrap_or(i16::MAX).to_le_bytes())?;

        // strf: BITMAPINFOHEADER
        writer.write_all(b"strf")?;
        writer.write_all(&BITMAP_INFO_HEADER_SIZE.to_le_bytes())?;
        writer.write_all(&BITMAP_INFO_HEADER_SIZE.to_le_bytes())?;
        writer.write_all(&width.to_le_bytes())?;
        writer.write_all(&height.to_le_bytes())?;
        writer.write_all(&1u16.to_le_bytes())?; // planes
        writer.write_all(&bit_count.to_le_bytes())?;
        writer.write_all(b"MJPG")?;
        writer.write_all(&frame_len.to_le_bytes())?;
        writer.write_all(&[0u8; 16])?;

        // movi list; its size is patched on close
        writer.write_all(b"LIST")?;
        writer.write_all(&4u32.to_le_bytes())?;
        writer.write_all(b"movi")?;

        Ok(())
    }

    /// Checks a frame against the registered geometry.
    fn check_frame(params: &StreamingParams, frame: &Frame) -> Result<(), SinkError> {
        if frame.width != params.width
            || frame.height != params.height
            || frame.depth != params.color_depth
        {
            return Err(SinkError::FrameMismatch {
                expected_width: params.width,
                expected_height: params.height,
                expected_depth: params.color_depth,
                width: frame.width,
                height: frame.height,
                depth: frame.depth,
            });
        }
        if !frame.is_consistent() {
            return Err(SinkError::MalformedFrame {
                expected: frame.expected_len(),
                actual: frame.pixels.len(),
            });
        }
        Ok(())
    }

    fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, SinkError> {
        let color_type = match frame.depth {
            ColorDepth::Gray => ExtendedColorType::L8,
            ColorDepth::Color => ExtendedColorType::Rgb8,
        };
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, quality)
            .write_image(&frame.pixels, frame.width, frame.height, color_type)
            .map_err(|e| SinkError::Encode {
                reason: e.to_string(),
            })?;
        Ok(jpeg)
    }

    /// Whether a file with a `movi` payload of `movi_len` bytes and `frames`
    /// index entries fits the 32-bit RIFF size.
    fn fits_in_riff(movi_len: u64, frames: usize) -> bool {
        let file_len = u64::from(AVI_HEADER_SIZE)
            + movi_len
            + 8
            + frames as u64 * u64::from(INDEX_ENTRY_SIZE);
        file_len <= AVI_MAX_FILE_SIZE
    }

    /// Performs the actual write operation in a blocking context.
    fn write_frame_blocking<W: Write>(
        state: &mut VideoState<W>,
        path: &Path,
        params: &StreamingParams,
        frame: &Frame,
        quality: u8,
    ) -> Result<(), SinkError> {
        if let Some(reason) = &state.poisoned {
            return Err(SinkError::Poisoned {
                reason: reason.clone(),
            });
        }
        let Some(writer) = state.writer.as_mut() else {
            return Err(SinkError::Closed);
        };
        Self::check_frame(params, frame)?;

        let jpeg = Self::encode_jpeg(frame, quality)?;
        let chunk_len = 8 + (jpeg.len() + jpeg.len() % 2) as u64;
        let next_len = state.movi_len + chunk_len;
        if !Self::fits_in_riff(next_len, state.index.len() + 1) {
            return Err(SinkError::ContainerFull {
                limit: AVI_MAX_FILE_SIZE,
            });
        }

        if let Err(e) = Self::write_chunk(writer, &jpeg) {
            // Part of the chunk may be on disk; every later offset would be wrong.
            state.writer = None;
            state.poisoned = Some(e.to_string());
            return Err(SinkError::file_error(path, e));
        }

        state.index.push(IndexEntry {
            offset: state.movi_len as u32,
            size: jpeg.len() as u32,
        });
        state.movi_len = next_len;
        Ok(())
    }

    /// Appends one `00dc` chunk, padded to an even length.
    fn write_chunk(writer: &mut impl Write, payload: &[u8]) -> std::io::Result<()> {
        writer.write_all(FRAME_CHUNK_ID)?;
        writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        writer.write_all(payload)?;
        if payload.len() % 2 == 1 {
            writer.write_all(&[0])?;
        }
        Ok(())
    }

    /// Writes the index and patches sizes and frame counts.
    ///
    /// Returns the flushed writer, or `None` if the sink was already closed.
    fn finalize_blocking<W: Write + Seek>(
        state: &mut VideoState<W>,
        path: &Path,
    ) -> Result<Option<W>, SinkError> {
        if let Some(reason) = &state.poisoned {
            return Err(SinkError::Poisoned {
                reason: reason.clone(),
            });
        }
        let Some(mut writer) = state.writer.take() else {
            // Already closed
            return Ok(None);
        };
        let io_err = |e| SinkError::file_error(path, e);

        // Bounded by the size check in every write.
        let frames = state.index.len() as u32;
        let movi_len = state.movi_len as u32;

        writer.write_all(b"idx1").map_err(io_err)?;
        writer
            .write_all(&(frames * INDEX_ENTRY_SIZE).to_le_bytes())
            .map_err(io_err)?;
        for entry in &state.index {
            writer.write_all(FRAME_CHUNK_ID).map_err(io_err)?;
            writer
                .write_all(&AVIIF_KEYFRAME.to_le_bytes())
                .map_err(io_err)?;
            writer.write_all(&entry.offset.to_le_bytes()).map_err(io_err)?;
            writer.write_all(&entry.size.to_le_bytes()).map_err(io_err)?;
        }

        let file_len = writer.stream_position().map_err(io_err)?;
        let riff_size = (file_len - 8) as u32;

        writer
            .seek(SeekFrom::Start(AVI_RIFF_SIZE_OFFSET))
            .map_err(io_err)?;
        writer.write_all(&riff_size.to_le_bytes()).map_err(io_err)?;

        writer
            .seek(SeekFrom::Start(AVI_TOTAL_FRAMES_OFFSET))
            .map_err(io_err)?;
        writer.write_all(&frames.to_le_bytes()).map_err(io_err)?;

        writer
            .seek(SeekFrom::Start(AVI_STREAM_LENGTH_OFFSET))
            .map_err(io_err)?;
        writer.write_all(&frames.to_le_bytes()).map_err(io_err)?;

        writer
            .seek(SeekFrom::Start(AVI_MOVI_SIZE_OFFSET))
            .map_err(io_err)?;
        writer.write_all(&movi_len.to_le_bytes()).map_err(io_err)?;

        writer.flush().map_err(io_err)?;
        Ok(Some(writer))
    }
}

#[async_trait]
impl Sink for VideoSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, item: Item) -> Result<(), SinkError> {
        let frame = match item {
            Item::Frame(frame) => frame,
            other => {
                return Err(SinkError::UnexpectedItem {
                    expected: "frame",
                    found: other.kind_name(),
                })
            }
        };

        tracing::trace!(
            "VideoSink {}: writing {}x{} frame",
            self.name,
            frame.width,
            frame.height
        );

        let state = Arc::clone(&self.state);
        let path = Arc::clone(&self.path);
        let params = self.params;
        let quality = self.quality;

        tokio::task::spawn_blocking(move || {
            let mut state = state.blocking_lock();
            Self::write_frame_blocking(&mut state, &path, &params, &frame, quality)
        })
        .await
        .map_err(|e| SinkError::custom(format!("write task panicked: {e}")))?
    }

    async fn close(&self) -> Result<(), SinkError> {
        let state = Arc::clone(&self.state);
        let path = Arc::clone(&self.path);

        tokio::task::spawn_blocking(move || {
            let mut state = state.blocking_lock();
            match Self::finalize_blocking(&mut state, &path)? {
                Some(writer) => writer
                    .get_ref()
                    .sync_all()
                    .map_err(|e| SinkError::file_error(&*path, e)),
                None => Ok(()),
            }
        })
        .await
        .map_err(|e| SinkError::custom(format!("finalize task panicked: {e}")))?
    }
}
