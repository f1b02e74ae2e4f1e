//! Drain loop - moves queued items into their sinks until the session stops.
//!
//! One [`DrainLoop`] owns one or more [`Lane`]s (a queue plus the sink it
//! feeds). Per-source mode runs one loop per streaming source; single-loop
//! mode runs one loop over all of them. Either way the loop:
//! 1. Pops at most one item per lane per tick and writes it
//! 2. Sleeps through a bounded backoff when a tick found nothing
//! 3. On the stop signal, writes a final snapshot of each queue
//! 4. Closes every sink it owns
//!
//! A lane whose sink fails in a way that affects every later item (see
//! [`SinkError::halts_sink`]) stops popping; its remaining items stay queued
//! for the next session.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::RecorderConfig;
use crate::event::EventCallback;
use crate::pipeline::{IdleBackoff, IngressQueue, StopSignal};
use crate::session::SourceReport;
use crate::sink::Sink;
use crate::source::SourceId;
use crate::{Item, RecorderEvent, SinkError};

/// A source's queue and the sink that persists it.
pub(crate) struct Lane {
    source_id: SourceId,
    queue: Arc<IngressQueue<Item>>,
    sink: Box<dyn Sink>,
    written: u64,
    rejected: u64,
    halted: bool,
}

/// What a lane reports once its sink is closed.
pub(crate) struct LaneOutcome {
    pub report: SourceReport,
    pub close_error: Option<SinkError>,
}

impl Lane {
    pub fn new(source_id: SourceId, queue: Arc<IngressQueue<Item>>, sink: Box<dyn Sink>) -> Self {
        Self {
            source_id,
            queue,
            sink,
            written: 0,
            rejected: 0,
            halted: false,
        }
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    /// Writes one item; a failed write skips the item and is reported.
    async fn write(&mut self, item: Item, events: Option<&EventCallback>) {
        match self.sink.write(item).await {
            Ok(()) => self.written += 1,
            Err(e) => {
                self.rejected += 1;
                if e.halts_sink() {
                    self.halted = true;
                    tracing::warn!(
                        source = %self.source_id,
                        error = %e,
                        "sink stopped accepting items, leaving the rest queued"
                    );
                } else if e.is_rejection() {
                    tracing::warn!(source = %self.source_id, error = %e, "item rejected, skipping");
                } else {
                    tracing::warn!(source = %self.source_id, error = %e, "sink write failed, skipping item");
                }
                if let Some(callback) = events {
                    callback(RecorderEvent::ItemRejected {
                        source_id: self.source_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    /// Pops and writes a single item. Returns `false` if the queue was empty.
    async fn step(&mut self, events: Option<&EventCallback>) -> bool {
        if self.halted {
            return false;
        }
        match self.queue.try_pop() {
            Some(item) => {
                self.write(item, events).await;
                true
            }
            None => false,
        }
    }

    /// Writes everything currently queued, oldest first.
    ///
    /// Items pushed after the snapshot is taken stay queued, and so does the
    /// rest of the snapshot if the sink halts midway.
    pub async fn drain_queue(&mut self, events: Option<&EventCallback>) {
        if self.halted || self.queue.is_empty() {
            return;
        }
        let items = self.queue.drain();
        tracing::debug!(
            "{}: writing {} queued items",
            self.source_id,
            items.len()
        );
        let mut items = items.into_iter();
        for item in items.by_ref() {
            self.write(item, events).await;
            if self.halted {
                break;
            }
        }
        let rest: Vec<Item> = items.collect();
        if !rest.is_empty() {
            self.queue.requeue(rest);
        }
    }

    /// Closes the sink and reports what was persisted.
    pub async fn close(self, events: Option<&EventCallback>) -> LaneOutcome {
        let close_error = match self.sink.close().await {
            Ok(()) => {
                tracing::info!(
                    "{}: {} closed ({} written, {} skipped)",
                    self.source_id,
                    self.sink.path().display(),
                    self.written,
                    self.rejected
                );
                if let Some(callback) = events {
                    callback(RecorderEvent::SinkClosed {
                        source_id: self.source_id.clone(),
                        items_written: self.written,
                    });
                }
                None
            }
            Err(e) => {
                tracing::warn!(source = %self.source_id, error = %e, "failed to close sink");
                if let Some(callback) = events {
                    callback(RecorderEvent::SinkError {
                        source_id: self.source_id.clone(),
                        error: e.to_string(),
                    });
                }
                Some(e)
            }
        };

        LaneOutcome {
            report: SourceReport {
                source_id: self.source_id,
                path: PathBuf::from(self.sink.path()),
                items_written: self.written,
                items_rejected: self.rejected,
            },
            close_error,
        }
    }
}

/// Worker that drains a fixed set of lanes until the stop signal is raised.
pub(crate) struct DrainLoop {
    lanes: Vec<Lane>,
    signal: StopSignal,
    backoff: IdleBackoff,
    event_callback: Option<EventCallback>,
}

impl DrainLoop {
    pub fn new(
        lanes: Vec<Lane>,
        signal: StopSignal,
        config: &RecorderConfig,
        event_callback: Option<EventCallback>,
    ) -> Self {
        Self {
            lanes,
            signal,
            backoff: IdleBackoff::new(config.idle_backoff_min, config.idle_backoff_max),
            event_callback,
        }
    }

    /// One pass over every lane. Returns `true` if any item was written.
    async fn tick(&mut self) -> bool {
        let events = self.event_callback.as_ref();
        let mut worked = false;
        for lane in &mut self.lanes {
            worked |= lane.step(events).await;
        }
        worked
    }

    /// Runs until the stop signal is raised, then drains and closes.
    pub async fn run(mut self) -> Vec<LaneOutcome> {
        tracing::debug!(
            "drain loop started for [{}]",
            self.lanes
                .iter()
                .map(|lane| lane.source_id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        while !self.signal.is_raised() {
            if self.tick().await {
                self.backoff.reset();
            } else {
                self.backoff.wait().await;
            }
        }

        let Self {
            lanes,
            event_callback,
            ..
        } = self;
        let events = event_callback.as_ref();

        let mut outcomes = Vec::with_capacity(lanes.len());
        for mut lane in lanes {
            lane.drain_queue(events).await;
            outcomes.push(lane.close(events).await);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use crate::Row;

    /// Records every row it receives; fails on rows whose first field is
    /// "bad" and reports itself full on "full".
    struct RecordingSink {
        name: String,
        path: PathBuf,
        seen: Arc<Mutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl RecordingSink {
        fn new(name: &str) -> (Self, Arc<Mutex<Vec<String>>>, Arc<AtomicBool>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let sink = Self {
                name: name.to_string(),
                path: PathBuf::from(format!("/tmp/{name}")),
                seen: Arc::clone(&seen),
                closed: Arc::clone(&closed),
            };
            (sink, seen, closed)
        }
    }

    #[async_trait]
    impl Sink for RecordingSink {
        fn name(&self) -> &str {
            &self.name
        }

        fn path(&self) -> &Path {
            &self.path
        }

        async fn write(&self, item: Item) -> Result<(), SinkError> {
            let Item::Row(row) = item else {
                return Err(SinkError::UnexpectedItem {
                    expected: "row",
                    found: item.kind_name(),
                });
            };
            if row.fields()[0] == "bad" {
                return Err(SinkError::custom("intentional failure"));
            }
            if row.fields()[0] == "full" {
                return Err(SinkError::ContainerFull { limit: 0 });
            }
            self.seen.lock().push(row.fields()[0].clone());
            Ok(())
        }

        async fn close(&self) -> Result<(), SinkError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast_config() -> RecorderConfig {
        RecorderConfig {
            idle_backoff_min: Duration::from_micros(50),
            idle_backoff_max: Duration::from_micros(500),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_drain_loop_writes_in_order_and_closes() {
        let queue = Arc::new(IngressQueue::new());
        let (sink, seen, closed) = RecordingSink::new("a");
        let lane = Lane::new(SourceId::new("a"), Arc::clone(&queue), Box::new(sink));
        let signal = StopSignal::new();
        let drain = DrainLoop::new(vec![lane], signal.clone(), &fast_config(), None);
        let handle = tokio::spawn(drain.run());

        for i in 0..20 {
            queue.push(Row::new([i.to_string()]).into());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.raise();

        let outcomes = handle.await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].report.items_written, 20);
        assert!(outcomes[0].close_error.is_none());
        assert!(closed.load(Ordering::SeqCst));

        let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        assert_eq!(*seen.lock(), expected);
    }

    #[tokio::test]
    async fn test_final_pass_writes_items_queued_before_stop() {
        let queue = Arc::new(IngressQueue::new());
        let (sink, seen, _) = RecordingSink::new("a");
        let lane = Lane::new(SourceId::new("a"), Arc::clone(&queue), Box::new(sink));
        let signal = StopSignal::new();

        // Raised before the loop ever ticks: only the final pass runs.
        for i in 0..5 {
            queue.push(Row::new([i.to_string()]).into());
        }
        signal.raise();

        let outcomes = DrainLoop::new(vec![lane], signal, &fast_config(), None)
            .run()
            .await;
        assert_eq!(outcomes[0].report.items_written, 5);
        assert_eq!(seen.lock().len(), 5);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_failed_items_are_skipped() {
        let queue = Arc::new(IngressQueue::new());
        let (sink, seen, _) = RecordingSink::new("a");
        let lane = Lane::new(SourceId::new("a"), Arc::clone(&queue), Box::new(sink));

        let rejected = Arc::new(Mutex::new(Vec::new()));
        let rejected_clone = Arc::clone(&rejected);
        let callback: EventCallback = Arc::new(move |event| {
            if let RecorderEvent::ItemRejected { error, .. } = event {
                rejected_clone.lock().push(error);
            }
        });

        queue.push(Row::new(["1"]).into());
        queue.push(Row::new(["bad"]).into());
        queue.push(Row::new(["2"]).into());
        let signal = StopSignal::new();
        signal.raise();

        let outcomes = DrainLoop::new(vec![lane], signal, &fast_config(), Some(callback))
            .run()
            .await;
        assert_eq!(outcomes[0].report.items_written, 2);
        assert_eq!(outcomes[0].report.items_rejected, 1);
        assert_eq!(*seen.lock(), vec!["1".to_string(), "2".to_string()]);
        assert_eq!(*rejected.lock(), vec!["intentional failure".to_string()]);
    }

    #[tokio::test]
    async fn test_single_loop_keeps_lanes_isolated() {
        let queue_a = Arc::new(IngressQueue::new());
        let queue_b = Arc::new(IngressQueue::new());
        let (sink_a, seen_a, _) = RecordingSink::new("a");
        let (sink_b, seen_b, _) = RecordingSink::new("b");
        let lanes = vec![
            Lane::new(SourceId::new("a"), Arc::clone(&queue_a), Box::new(sink_a)),
            Lane::new(SourceId::new("b"), Arc::clone(&queue_b), Box::new(sink_b)),
        ];
        let signal = StopSignal::new();
        let handle = tokio::spawn(DrainLoop::new(lanes, signal.clone(), &fast_config(), None).run());

        for i in 0..50 {
            queue_a.push(Row::new([format!("a{i}")]).into());
            if i % 2 == 0 {
                queue_b.push(Row::new([format!("b{i}")]).into());
            }
        }
        signal.raise();
        let outcomes = handle.await.unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(seen_a.lock().iter().all(|s| s.starts_with('a')));
        assert!(seen_b.lock().iter().all(|s| s.starts_with('b')));
        assert_eq!(seen_a.lock().len(), 50);
        assert_eq!(seen_b.lock().len(), 25);
    }

    #[tokio::test]
    async fn test_loop_exits_promptly_when_idle() {
        let queue = Arc::new(IngressQueue::new());
        let (sink, _, closed) = RecordingSink::new("a");
        let lane = Lane::new(SourceId::new("a"), queue, Box::new(sink));
        let signal = StopSignal::new();
        let handle = tokio::spawn(DrainLoop::new(vec![lane], signal.clone(), &fast_config(), None).run());

        tokio::time::sleep(Duration::from_millis(20)).await;
        signal.raise();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_halted_lane_leaves_items_queued() {
        let queue = Arc::new(IngressQueue::new());
        let (sink, seen, closed) = RecordingSink::new("a");
        let lane = Lane::new(SourceId::new("a"), Arc::clone(&queue), Box::new(sink));

        let rejected = Arc::new(Mutex::new(0usize));
        let rejected_clone = Arc::clone(&rejected);
        let callback: EventCallback = Arc::new(move |event| {
            if let RecorderEvent::ItemRejected { .. } = event {
                *rejected_clone.lock() += 1;
            }
        });

        for field in ["1", "full", "2", "3"] {
            queue.push(Row::new([field]).into());
        }
        let signal = StopSignal::new();
        signal.raise();

        let outcomes = DrainLoop::new(vec![lane], signal, &fast_config(), Some(callback))
            .run()
            .await;
        assert_eq!(outcomes[0].report.items_written, 1);
        assert_eq!(outcomes[0].report.items_rejected, 1);
        assert_eq!(*rejected.lock(), 1);
        assert_eq!(*seen.lock(), vec!["1".to_string()]);
        assert!(closed.load(Ordering::SeqCst));

        let left: Vec<Item> = queue.drain();
        assert_eq!(left, vec![Row::new(["2"]).into(), Row::new(["3"]).into()]);
    }

    #[tokio::test]
    async fn test_halted_lane_stops_popping_while_running() {
        let queue = Arc::new(IngressQueue::new());
        let (sink, seen, _) = RecordingSink::new("a");
        let lane = Lane::new(SourceId::new("a"), Arc::clone(&queue), Box::new(sink));
        let signal = StopSignal::new();
        let handle = tokio::spawn(DrainLoop::new(vec![lane], signal.clone(), &fast_config(), None).run());

        queue.push(Row::new(["full"]).into());
        tokio::time::sleep(Duration::from_millis(10)).await;
        for i in 0..5 {
            queue.push(Row::new([i.to_string()]).into());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.raise();

        let outcomes = handle.await.unwrap();
        assert_eq!(outcomes[0].report.items_rejected, 1);
        assert!(seen.lock().is_empty());
        assert_eq!(queue.len(), 5);
    }
}
