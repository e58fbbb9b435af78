//! Timing harness
//!
//! Wraps a round so its wall-clock time is measured and recorded in a
//! caller-owned [`RoundHistory`]. The orchestrators time dispatch through
//! aggregation themselves; `timed` keeps that measurement and only falls
//! back to timing the whole closure when a round reports no elapsed time.

pub mod bench;
pub mod history;

pub use bench::{BenchReport, BenchRow, BenchSession};
pub use history::{RoundHistory, RoundRecord};

use crate::error::RoundError;
use crate::partition::Range;
use crate::results::AggregateResult;
use crate::util::time::Stopwatch;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Execution strategy of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Whole range on the calling thread
    Sequential,
    /// One local thread per chunk
    Local,
    /// One worker process per chunk over TCP
    Network,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Sequential => write!(f, "sequential"),
            Strategy::Local => write!(f, "local"),
            Strategy::Network => write!(f, "network"),
        }
    }
}

/// Run `round`, attach its elapsed time and append it to `history`
///
/// A failed round is not recorded.
pub fn timed<F>(
    history: &mut RoundHistory,
    strategy: Strategy,
    range: Range,
    worker_count: usize,
    round: F,
) -> Result<AggregateResult, RoundError>
where
    F: FnOnce(Range, usize) -> Result<AggregateResult, RoundError>,
{
    let stopwatch = Stopwatch::start();
    let result = round(range, worker_count)?;
    let result = settle_elapsed(result, stopwatch.elapsed());

    debug!(%strategy, %range, workers = worker_count, elapsed_ms = result.elapsed().as_millis() as u64, "round recorded");
    history.record(RoundRecord::new(strategy, range, worker_count, result.elapsed()));
    Ok(result)
}

fn settle_elapsed(result: AggregateResult, measured: Duration) -> AggregateResult {
    if result.elapsed().is_zero() {
        result.with_elapsed(measured)
    } else {
        result
    }
}
