//! Partial and aggregate round results
//!
//! A `PartialResult` is what one worker found in its chunk. An
//! `AggregateResult` is the merged, deduplicated, sorted answer for a whole
//! round, built once by the [`aggregator`] and never modified afterwards.

pub mod aggregator;

pub use aggregator::{aggregate, Aggregator};

use crate::error::RoundError;
use std::collections::BTreeSet;
use std::time::Duration;

/// Perfect numbers and amicable pairs found by one worker
///
/// Pairs are always stored as `(smaller, larger)`. A chunk reports a pair when
/// at least one of its members lies inside the chunk, so the same pair may be
/// reported by two chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialResult {
    perfect_numbers: BTreeSet<u64>,
    amicable_pairs: BTreeSet<(u64, u64)>,
}

impl PartialResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a partial result from raw lists, validating every entry
    ///
    /// Used for untrusted input such as a decoded worker message. Pairs are
    /// normalized before insertion.
    pub fn from_parts(perfect_numbers: Vec<u64>, amicable_pairs: Vec<(u64, u64)>) -> Result<Self, RoundError> {
        let mut partial = Self::new();
        for n in perfect_numbers {
            if n == 0 {
                return Err(RoundError::AggregationError(
                    "perfect number 0 is not a positive integer".to_string(),
                ));
            }
            partial.perfect_numbers.insert(n);
        }
        for (a, b) in amicable_pairs {
            partial.try_insert_pair(a, b)?;
        }
        Ok(partial)
    }

    pub fn insert_perfect(&mut self, n: u64) {
        self.perfect_numbers.insert(n);
    }

    /// Insert a pair in either order
    pub fn insert_pair(&mut self, a: u64, b: u64) {
        self.amicable_pairs.insert((a.min(b), a.max(b)));
    }

    fn try_insert_pair(&mut self, a: u64, b: u64) -> Result<(), RoundError> {
        validate_pair(a, b)?;
        self.insert_pair(a, b);
        Ok(())
    }

    pub fn perfect_numbers(&self) -> &BTreeSet<u64> {
        &self.perfect_numbers
    }

    pub fn amicable_pairs(&self) -> &BTreeSet<(u64, u64)> {
        &self.amicable_pairs
    }

    pub fn is_empty(&self) -> bool {
        self.perfect_numbers.is_empty() && self.amicable_pairs.is_empty()
    }

    /// Check the schema invariants of this result
    pub fn validate(&self) -> Result<(), RoundError> {
        if self.perfect_numbers.contains(&0) {
            return Err(RoundError::AggregationError(
                "perfect number 0 is not a positive integer".to_string(),
            ));
        }
        for &(a, b) in &self.amicable_pairs {
            validate_pair(a, b)?;
            if a > b {
                return Err(RoundError::AggregationError(format!(
                    "amicable pair ({}, {}) is not normalized",
                    a, b
                )));
            }
        }
        Ok(())
    }
}

fn validate_pair(a: u64, b: u64) -> Result<(), RoundError> {
    if a == 0 || b == 0 {
        return Err(RoundError::AggregationError(format!(
            "amicable pair ({}, {}) contains zero",
            a, b
        )));
    }
    if a == b {
        return Err(RoundError::AggregationError(format!(
            "amicable pair ({}, {}) has identical members",
            a, b
        )));
    }
    Ok(())
}

/// Global, deduplicated answer for one round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateResult {
    perfect_numbers: Vec<u64>,
    amicable_pairs: Vec<(u64, u64)>,
    elapsed: Duration,
    worker_count: usize,
}

impl AggregateResult {
    pub(crate) fn new(
        perfect_numbers: Vec<u64>,
        amicable_pairs: Vec<(u64, u64)>,
        elapsed: Duration,
        worker_count: usize,
    ) -> Self {
        Self {
            perfect_numbers,
            amicable_pairs,
            elapsed,
            worker_count,
        }
    }

    /// Sorted ascending, no duplicates
    pub fn perfect_numbers(&self) -> &[u64] {
        &self.perfect_numbers
    }

    /// Sorted ascending by `(smaller, larger)`, no duplicates
    pub fn amicable_pairs(&self) -> &[(u64, u64)] {
        &self.amicable_pairs
    }

    /// Wall-clock time from dispatch to aggregation
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Same numbers and pairs, regardless of timing and worker count
    pub fn same_findings(&self, other: &AggregateResult) -> bool {
        self.perfect_numbers == other.perfect_numbers && self.amicable_pairs == other.amicable_pairs
    }

    /// Attach the measured round duration
    pub(crate) fn with_elapsed(self, elapsed: Duration) -> Self {
        Self { elapsed, ..self }
    }
}
