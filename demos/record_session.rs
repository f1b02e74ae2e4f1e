//! Record session demo.
//!
//! Registers one streaming and one tabular source, feeds both from synthetic
//! producer threads at roughly 30 items per second, then stops the session.
//!
//! Run with: cargo run --example record_session -- [OUTPUT_DIR] [SECONDS]
//!
//! Set `RUST_LOG=session_recorder=debug` for per-sink detail.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use session_recorder::{
    ColorDepth, LoopMode, RecorderEvent, SessionRecorder, SourceDescriptor, SyntheticFrames,
    SyntheticRows,
};
use tracing_subscriber::EnvFilter;

const ITEM_INTERVAL: Duration = Duration::from_millis(33);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let root = args.next().unwrap_or_else(|| "recordings".to_string());
    let seconds: u64 = match args.next() {
        Some(s) => s.parse()?,
        None => 3,
    };

    let camera = SourceDescriptor::streaming("camera", 640, 480, ColorDepth::Gray)?;
    let Some(params) = camera.streaming_params().copied() else {
        return Err("camera must be a streaming source".into());
    };

    let recorder = Arc::new(
        SessionRecorder::builder(&root)
            .register_source(camera)
            .register_source(SourceDescriptor::tabular("dummy")?)
            .on_event(|event| match event {
                RecorderEvent::ItemRejected { source_id, error } => {
                    eprintln!("Skipped item from '{source_id}': {error}");
                }
                RecorderEvent::SinkError { source_id, error } => {
                    eprintln!("Sink for '{source_id}' failed: {error}");
                }
                RecorderEvent::SinkClosed {
                    source_id,
                    items_written,
                } => {
                    println!("{source_id}: {items_written} items");
                }
                _ => {}
            })
            .build()?,
    );

    let directory = recorder.start(LoopMode::PerSourceLoop).await?;
    println!("Recording to {} for {seconds}s...", directory.display());

    let running = Arc::new(AtomicBool::new(true));

    let frame_producer = {
        let recorder = Arc::clone(&recorder);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut frames = SyntheticFrames::new(params);
            while running.load(Ordering::Relaxed) {
                if let Err(e) = recorder.enqueue("camera", frames.next_frame()) {
                    eprintln!("camera producer: {e}");
                    break;
                }
                thread::sleep(ITEM_INTERVAL);
            }
        })
    };

    let row_producer = {
        let recorder = Arc::clone(&recorder);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut rows = SyntheticRows::new();
            while running.load(Ordering::Relaxed) {
                if let Err(e) = recorder.enqueue("dummy", rows.next_row()) {
                    eprintln!("dummy producer: {e}");
                    break;
                }
                thread::sleep(ITEM_INTERVAL);
            }
        })
    };

    tokio::time::sleep(Duration::from_secs(seconds)).await;

    running.store(false, Ordering::Relaxed);
    for producer in [frame_producer, row_producer] {
        if producer.join().is_err() {
            eprintln!("producer thread panicked");
        }
    }

    if let Some(report) = recorder.stop().await? {
        println!();
        println!("Session {}:", report.directory.display());
        for source in &report.sources {
            println!(
                "  {} -> {} ({} written, {} skipped)",
                source.source_id,
                source.path.display(),
                source.items_written,
                source.items_rejected
            );
        }
    }

    Ok(())
}
