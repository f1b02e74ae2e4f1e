//! Delimited table sink for tabular sources.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::TableLayout;
use crate::sink::Sink;
use crate::source::SourceDescriptor;
use crate::{Item, Row, SinkError};

/// A sink that buffers rows in memory and writes them as one CSV file on `close()`.
///
/// The file is created when the sink is opened, so an unwritable directory
/// fails early; nothing is written to it until `close()`.
///
/// Format:
/// - one record per row, in write order, `\n` line endings
/// - fields containing the delimiter, a quote, `\r` or `\n` are quoted, with
///   embedded quotes doubled
/// - rows shorter than the widest row are padded with empty fields
/// - with [`TableLayout::header`], a first record of column positions
///   (`0,1,2,...`)
/// - with [`TableLayout::index_column`], a leading column of row numbers
///   starting at 0, whose header cell is empty
///
/// A sink closed without rows produces an empty file.
pub struct TableSink {
    name: String,
    path: Arc<PathBuf>,
    layout: TableLayout,
    state: Arc<Mutex<TableState>>,
}

struct TableState {
    writer: Option<BufWriter<File>>,
    rows: Vec<Row>,
}

impl TableSink {
    /// Creates `{session_dir}/{name}.csv`.
    ///
    /// # Errors
    ///
    /// - [`SinkError::InvalidParameters`] if the descriptor is a streaming source
    /// - [`SinkError::FileError`] if the file cannot be created
    pub async fn open(
        session_dir: &Path,
        descriptor: &SourceDescriptor,
        layout: TableLayout,
    ) -> Result<Self, SinkError> {
        if descriptor.is_streaming() {
            return Err(SinkError::InvalidParameters {
                reason: format!("source '{}' is not a tabular source", descriptor.name()),
            });
        }

        let path = Arc::new(session_dir.join(descriptor.file_name()));
        let create_path = Arc::clone(&path);

        let writer = tokio::task::spawn_blocking(move || {
            File::create(&*create_path)
                .map(BufWriter::new)
                .map_err(|e| SinkError::file_error(&*create_path, e))
        })
        .await
        .map_err(|e| SinkError::custom(format!("open task panicked: {e}")))??;

        Ok(Self {
            name: descriptor.name().to_string(),
            path,
            layout,
            state: Arc::new(Mutex::new(TableState {
                writer: Some(writer),
                rows: Vec::new(),
            })),
        })
    }

    /// Number of rows buffered so far.
    pub async fn buffered_rows(&self) -> usize {
        self.state.lock().await.rows.len()
    }

    /// Appends one field, quoting it if needed.
    fn push_field(record: &mut String, field: &str, delimiter: char) {
        let needs_quotes = field
            .chars()
            .any(|c| c == delimiter || c == '"' || c == '\n' || c == '\r');
        if needs_quotes {
            record.push('"');
            record.push_str(&field.replace('"', "\"\""));
            record.push('"');
        } else {
            record.push_str(field);
        }
    }

    /// Renders the whole table.
    fn render(rows: &[Row], layout: TableLayout) -> String {
        let width = rows.iter().map(Row::len).max().unwrap_or(0);
        let delimiter = char::from(layout.delimiter);
        let mut out = String::new();

        if layout.header && !rows.is_empty() {
            let mut cells: Vec<String> = Vec::with_capacity(width + 1);
            if layout.index_column {
                cells.push(String::new());
            }
            cells.extend((0..width).map(|i| i.to_string()));
            out.push_str(&cells.join(&delimiter.to_string()));
            out.push('\n');
        }

        for (index, row) in rows.iter().enumerate() {
            let mut record = String::new();
            if layout.index_column {
                record.push_str(&index.to_string());
                if width > 0 {
                    record.push(delimiter);
                }
            }
            for column in 0..width {
                if column > 0 {
                    record.push(delimiter);
                }
                if let Some(field) = row.fields().get(column) {
                    Self::push_field(&mut record, field, delimiter);
                }
            }
            out.push_str(&record);
            out.push('\n');
        }

        out
    }

    /// Serializes the buffered rows and releases the file.
    fn flush_blocking(
        state: &mut TableState,
        path: &Path,
        layout: TableLayout,
    ) -> Result<usize, SinkError> {
        let Some(mut writer) = state.writer.take() else {
            // Already closed
            return Ok(0);
        };
        let rows = std::mem::take(&mut state.rows);
        let table = Self::render(&rows, layout);

        writer
            .write_all(table.as_bytes())
            .map_err(|e| SinkError::file_error(path, e))?;
        writer.flush().map_err(|e| SinkError::file_error(path, e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| SinkError::file_error(path, e))?;
        Ok(rows.len())
    }
}

#[async_trait]
impl Sink for TableSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, item: Item) -> Result<(), SinkError> {
        let row = match item {
            Item::Row(row) => row,
            other => {
                return Err(SinkError::UnexpectedItem {
                    expected: "row",
                    found: other.kind_name(),
                })
            }
        };

        let mut state = self.state.lock().await;
        if state.writer.is_none() {
            return Err(SinkError::Closed);
        }
        state.rows.push(row);
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        let state = Arc::clone(&self.state);
        let path = Arc::clone(&self.path);
        let layout = self.layout;

        let rows = tokio::task::spawn_blocking(move || {
            let mut state = state.blocking_lock();
            Self::flush_blocking(&mut state, &path, layout)
        })
        .await
        .map_err(|e| SinkError::custom(format!("flush task panicked: {e}")))??;

        tracing::debug!("TableSink {}: wrote {} rows", self.name, rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn log_sink(dir: &Path, layout: TableLayout) -> TableSink {
        let desc = SourceDescriptor::tabular("log").unwrap();
        TableSink::open(dir, &desc, layout).await.unwrap()
    }

    #[tokio::test]
    async fn test_table_sink_writes_rows_in_order() {
        let dir = tempdir().unwrap();
        let sink = log_sink(dir.path(), TableLayout::default()).await;

        sink.write(Row::new(["1", "2", "3"]).into()).await.unwrap();
        sink.write(Row::new(["4", "5", "6"]).into()).await.unwrap();
        assert_eq!(sink.buffered_rows().await, 2);
        sink.close().await.unwrap();

        let text = std::fs::read_to_string(dir.path().join("log.csv")).unwrap();
        assert_eq!(text, "0,1,2\n1,2,3\n4,5,6\n");
    }

    #[tokio::test]
    async fn test_table_sink_file_created_on_open() {
        let dir = tempdir().unwrap();
        let _sink = log_sink(dir.path(), TableLayout::default()).await;
        let metadata = std::fs::metadata(dir.path().join("log.csv")).unwrap();
        assert_eq!(metadata.len(), 0);
    }

    #[tokio::test]
    async fn test_table_sink_empty_table() {
        let dir = tempdir().unwrap();
        let sink = log_sink(dir.path(), TableLayout::default()).await;
        sink.close().await.unwrap();

        let text = std::fs::read_to_string(dir.path().join("log.csv")).unwrap();
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn test_table_sink_index_column() {
        let dir = tempdir().unwrap();
        let layout = TableLayout {
            index_column: true,
            ..Default::default()
        };
        let sink = log_sink(dir.path(), layout).await;
        sink.write(Row::new(["a", "b"]).into()).await.unwrap();
        sink.write(Row::new(["c", "d"]).into()).await.unwrap();
        sink.close().await.unwrap();

        let text = std::fs::read_to_string(dir.path().join("log.csv")).unwrap();
        assert_eq!(text, ",0,1\n0,a,b\n1,c,d\n");
    }

    #[tokio::test]
    async fn test_table_sink_quotes_and_pads() {
        let dir = tempdir().unwrap();
        let layout = TableLayout {
            header: false,
            ..Default::default()
        };
        let sink = log_sink(dir.path(), layout).await;
        sink.write(Row::new(["a,b", "say \"hi\"", "x"]).into())
            .await
            .unwrap();
        sink.write(Row::new(["line\nbreak"]).into()).await.unwrap();
        sink.close().await.unwrap();

        let text = std::fs::read_to_string(dir.path().join("log.csv")).unwrap();
        assert_eq!(text, "\"a,b\",\"say \"\"hi\"\"\",x\n\"line\nbreak\",,\n");
    }

    #[tokio::test]
    async fn test_table_sink_custom_delimiter() {
        let dir = tempdir().unwrap();
        let layout = TableLayout {
            delimiter: b';',
            header: false,
            index_column: false,
        };
        let sink = log_sink(dir.path(), layout).await;
        sink.write(Row::new(["a,b", "c"]).into()).await.unwrap();
        sink.close().await.unwrap();

        let text = std::fs::read_to_string(dir.path().join("log.csv")).unwrap();
        assert_eq!(text, "a,b;c\n");
    }

    #[tokio::test]
    async fn test_table_sink_write_after_close() {
        let dir = tempdir().unwrap();
        let sink = log_sink(dir.path(), TableLayout::default()).await;
        sink.write(Row::new(["1"]).into()).await.unwrap();
        sink.close().await.unwrap();

        let result = sink.write(Row::new(["2"]).into()).await;
        assert!(matches!(result, Err(SinkError::Closed)));

        // Second close is a no-op and leaves the file alone
        sink.close().await.unwrap();
        let text = std::fs::read_to_string(dir.path().join("log.csv")).unwrap();
        assert_eq!(text, "0\n1\n");
    }

    #[tokio::test]
    async fn test_table_sink_rejects_frames() {
        let dir = tempdir().unwrap();
        let sink = log_sink(dir.path(), TableLayout::default()).await;
        let frame = crate::Frame::filled(2, 2, crate::source::ColorDepth::Gray, 0);
        let result = sink.write(frame.into()).await;
        assert!(matches!(result, Err(SinkError::UnexpectedItem { .. })));
    }

    #[tokio::test]
    async fn test_table_sink_rejects_streaming_descriptor() {
        let dir = tempdir().unwrap();
        let desc = SourceDescriptor::streaming("cam", 4, 4, crate::source::ColorDepth::Gray)
            .unwrap();
        let result = TableSink::open(dir.path(), &desc, TableLayout::default()).await;
        assert!(matches!(result, Err(SinkError::InvalidParameters { .. })));
    }
}
