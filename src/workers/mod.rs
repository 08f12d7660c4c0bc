//! Consumer worker threads.
//!
//! Each worker owns one input queue fed by the orchestrator's relay loop
//! and follows the same discipline: block on the queue with a bounded
//! timeout, re-check the termination signal, absorb per-sample failures
//! locally. Nothing a worker does ever propagates across its thread
//! boundary; the orchestrator only observes liveness.

pub mod display;
pub mod persist;

use std::time::Duration;

/// How long a worker blocks on its queue before re-checking the
/// termination signal. Bounds worst-case shutdown latency.
pub const QUEUE_WAIT: Duration = Duration::from_secs(1);
