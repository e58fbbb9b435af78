//! Result aggregation
//!
//! Merges partial results from every chunk of a round into one global view.
//! The aggregator keeps each chunk's partial result, keyed by chunk index,
//! and computes the deduplicated union on demand.
//!
//! # Example
//!
//! ```
//! use amipulse::results::{Aggregator, PartialResult};
//!
//! let mut left = PartialResult::new();
//! left.insert_perfect(6);
//! left.insert_pair(220, 284);
//!
//! let mut right = PartialResult::new();
//! right.insert_pair(284, 220);
//!
//! let mut aggregator = Aggregator::new();
//! aggregator.add_partial(0, left).unwrap();
//! aggregator.add_partial(1, right).unwrap();
//!
//! let result = aggregator.aggregate(2);
//! assert_eq!(result.perfect_numbers(), &[6]);
//! assert_eq!(result.amicable_pairs(), &[(220, 284)]);
//! ```

use crate::error::RoundError;
use crate::partition::Range;
use crate::results::{AggregateResult, PartialResult};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Aggregator for the partial results of one round
///
/// # Usage
///
/// 1. Create with `new()`, or `within(range)` to clip findings to the round's range
/// 2. Add each chunk's result with `add_partial()`
/// 3. Build the final view with `aggregate()`
#[derive(Debug, Default)]
pub struct Aggregator {
    /// Per-chunk partial results (chunk index → result)
    partials: BTreeMap<usize, PartialResult>,

    /// Global range of the round; findings outside it are dropped
    scope: Option<Range>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregator that keeps only numbers inside `scope`
    ///
    /// A chunk validates a pair's partner wherever it falls, so the partner
    /// can lie past the end of the round. A pair is kept only when both of
    /// its members are inside the range.
    pub fn within(scope: Range) -> Self {
        Self {
            partials: BTreeMap::new(),
            scope: Some(scope),
        }
    }

    /// Add the result of one chunk
    ///
    /// Fails with `AggregationError` if the result is malformed or the chunk
    /// already delivered a result this round.
    pub fn add_partial(&mut self, chunk: usize, partial: PartialResult) -> Result<(), RoundError> {
        partial.validate()?;
        if self.partials.contains_key(&chunk) {
            return Err(RoundError::AggregationError(format!(
                "chunk {} delivered more than one result",
                chunk
            )));
        }
        self.partials.insert(chunk, partial);
        Ok(())
    }

    /// Union of all partial results, sorted and deduplicated
    ///
    /// Elapsed time is left at zero; the timing harness attaches it.
    pub fn aggregate(&self, worker_count: usize) -> AggregateResult {
        let mut perfect = BTreeSet::new();
        let mut pairs = BTreeSet::new();

        for partial in self.partials.values() {
            perfect.extend(partial.perfect_numbers().iter().copied());
            pairs.extend(partial.amicable_pairs().iter().map(|&(a, b)| (a.min(b), a.max(b))));
        }

        if let Some(scope) = self.scope {
            perfect.retain(|n| scope.contains(*n));
            pairs.retain(|(a, b)| scope.contains(*a) && scope.contains(*b));
        }

        AggregateResult::new(
            perfect.into_iter().collect(),
            pairs.into_iter().collect(),
            Duration::ZERO,
            worker_count,
        )
    }
}

/// Aggregate a sequence of partial results without range clipping
///
/// Chunks are numbered in iteration order.
pub fn aggregate<I>(partials: I, worker_count: usize) -> Result<AggregateResult, RoundError>
where
    I: IntoIterator<Item = PartialResult>,
{
    let mut aggregator = Aggregator::new();
    for (chunk, partial) in partials.into_iter().enumerate() {
        aggregator.add_partial(chunk, partial)?;
    }
    Ok(aggregator.aggregate(worker_count))
}
