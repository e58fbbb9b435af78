//! Local execution strategies
//!
//! This module runs a round inside one process:
//!
//! - **Sequential**: the whole range analyzed on the calling thread
//! - **Local threads**: one OS thread per work item, results deposited into a
//!   [`RoundBarrier`] and merged once every thread has reported
//!
//! A failing chunk is fatal to the round; no partial aggregate is returned.
//!
//! # Example
//!
//! ```
//! use amipulse::partition::Range;
//! use amipulse::worker::run_local;
//!
//! let result = run_local(Range::new(1, 300).unwrap(), 2).unwrap();
//! assert_eq!(result.perfect_numbers(), &[6, 28]);
//! assert_eq!(result.amicable_pairs(), &[(220, 284)]);
//! ```

pub mod barrier;

pub use barrier::{BarrierError, RoundBarrier};

use crate::analyzer::{ChunkAnalyzer, DivisorSumAnalyzer};
use crate::error::RoundError;
use crate::partition::{partition, Range, WorkItem};
use crate::results::{AggregateResult, Aggregator, PartialResult};
use crate::util::time::Stopwatch;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Run a round on `worker_count` local threads with the divisor-sum analyzer
pub fn run_local(range: Range, worker_count: usize) -> Result<AggregateResult, RoundError> {
    LocalOrchestrator::new(DivisorSumAnalyzer).run(range, worker_count)
}

/// Run a round on the calling thread with the divisor-sum analyzer
pub fn run_sequential(range: Range) -> Result<AggregateResult, RoundError> {
    run_sequential_with(&DivisorSumAnalyzer, range)
}

/// Single-threaded baseline
pub fn run_sequential_with<A: ChunkAnalyzer + ?Sized>(analyzer: &A, range: Range) -> Result<AggregateResult, RoundError> {
    let stopwatch = Stopwatch::start();

    let partial = analyzer.analyze(range).map_err(|e| RoundError::AnalyzerFailure {
        chunk: 0,
        reason: e.to_string(),
    })?;

    let mut aggregator = Aggregator::within(range);
    aggregator.add_partial(0, partial)?;
    let result = aggregator.aggregate(1);

    Ok(result.with_elapsed(stopwatch.elapsed()))
}

/// Analyze one work item; degenerate items yield an empty result
pub(crate) fn analyze_item<A: ChunkAnalyzer + ?Sized>(analyzer: &A, item: &WorkItem) -> Result<PartialResult, RoundError> {
    match item.range() {
        Some(range) => analyzer.analyze(range).map_err(|e| RoundError::AnalyzerFailure {
            chunk: item.index,
            reason: e.to_string(),
        }),
        None => Ok(PartialResult::new()),
    }
}

/// Multi-threaded orchestrator for one process
///
/// Each round gets a fresh barrier and fresh threads; nothing survives
/// between rounds except the analyzer.
pub struct LocalOrchestrator {
    analyzer: Arc<dyn ChunkAnalyzer>,

    /// Bound on the join barrier (`None` waits for every thread)
    timeout: Option<Duration>,
}

impl LocalOrchestrator {
    pub fn new<A: ChunkAnalyzer + 'static>(analyzer: A) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            timeout: None,
        }
    }

    /// Bound the wait for stragglers
    ///
    /// Threads still running at the deadline are detached; the round fails.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Partition, compute on one thread per chunk, then aggregate
    pub fn run(&self, range: Range, worker_count: usize) -> Result<AggregateResult, RoundError> {
        let items = partition(range, worker_count)?;
        let stopwatch = Stopwatch::start();

        info!(range = %range, workers = worker_count, "starting local round");

        let barrier: RoundBarrier<Result<PartialResult, RoundError>> = RoundBarrier::new(items.len());
        let mut handles = Vec::with_capacity(items.len());

        for item in items {
            let analyzer = Arc::clone(&self.analyzer);
            let tx = barrier.sender();

            let handle = std::thread::Builder::new()
                .name(format!("amipulse-worker-{}", item.index))
                .spawn(move || {
                    debug!(%item, "analyzing");
                    let outcome = analyze_item(analyzer.as_ref(), &item);
                    // Receiver only disappears when the round already failed
                    let _ = tx.send((item.index, outcome));
                })
                .map_err(|e| RoundError::AnalyzerFailure {
                    chunk: item.index,
                    reason: format!("failed to spawn worker thread: {}", e),
                })?;

            handles.push(handle);
        }

        let arrived = barrier.wait_timeout(self.timeout).map_err(|e| {
            let chunk = e.missing().first().copied().unwrap_or(0);
            let reason = match e {
                BarrierError::TimedOut { .. } => format!("timed out after {:?}", self.timeout.unwrap_or_default()),
                BarrierError::Disconnected { .. } => "worker thread panicked".to_string(),
            };
            RoundError::AnalyzerFailure { chunk, reason }
        })?;

        // Every thread has already reported, so joining only reaps them
        for handle in handles {
            let _ = handle.join();
        }

        let mut aggregator = Aggregator::within(range);
        for (chunk, outcome) in arrived {
            aggregator.add_partial(chunk, outcome?)?;
        }
        let result = aggregator.aggregate(worker_count);

        info!(
            perfect = result.perfect_numbers().len(),
            pairs = result.amicable_pairs().len(),
            "local round complete"
        );

        Ok(result.with_elapsed(stopwatch.elapsed()))
    }
}
