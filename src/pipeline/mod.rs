//! Recording pipeline components.
//!
//! Producers never touch a sink directly; every item passes through the
//! source's ingress queue:
//!
//! ```text
//! Producer threads → Ingress Queue → Drain Loop → Sink (video file)
//! Producer threads → Ingress Queue ─────(stop)──→ Sink (table file)
//! ```
//!
//! - **Ingress Queue**: Unbounded FIFO, so `enqueue` never waits on disk
//! - **Drain Loop**: Pops items into sinks, backs off when idle, drains the
//!   remainder and closes its sinks when the stop signal is raised
//! - **Stop Signal**: Shared flag that ends every drain loop of one session
//!
//! Tabular queues have no drain loop; they are written in one pass at stop.

mod drain;
mod queue;
mod signal;

pub(crate) use drain::{DrainLoop, Lane, LaneOutcome};
pub(crate) use queue::IngressQueue;
pub(crate) use signal::{IdleBackoff, StopSignal};
