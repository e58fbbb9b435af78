//! Range partitioning
//!
//! Splits an inclusive integer range into contiguous, non-overlapping work
//! items, one per worker. The last worker absorbs the remainder of the integer
//! division so the union of all items always covers the requested range.
//!
//! # Example
//!
//! ```
//! use amipulse::partition::{partition, Range};
//!
//! let items = partition(Range::new(1, 300).unwrap(), 2).unwrap();
//! assert_eq!(items[0].bounds(), (1, 150));
//! assert_eq!(items[1].bounds(), (151, 300));
//! ```

use crate::error::RoundError;
use std::fmt;

/// Inclusive interval of candidate numbers
///
/// Always satisfies `1 <= start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    start: u64,
    end: u64,
}

impl Range {
    /// Create a range, rejecting zero starts and inverted bounds
    pub fn new(start: u64, end: u64) -> Result<Self, RoundError> {
        if start == 0 {
            return Err(RoundError::InvalidPartition(
                "range start must be at least 1".to_string(),
            ));
        }
        if end < start {
            return Err(RoundError::InvalidPartition(format!(
                "range end {} is below start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of integers in the range
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn contains(&self, n: u64) -> bool {
        n >= self.start && n <= self.end
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<u64> {
        self.start..=self.end
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// One chunk of a round, assigned to exactly one worker
///
/// `upper < lower` marks a degenerate chunk, produced when there are more
/// workers than numbers. Degenerate chunks are still dispatched so every
/// expected worker receives an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItem {
    pub index: usize,
    pub lower: u64,
    pub upper: u64,
}

impl WorkItem {
    pub fn bounds(&self) -> (u64, u64) {
        (self.lower, self.upper)
    }

    pub fn is_empty(&self) -> bool {
        self.upper < self.lower
    }

    /// The chunk as a `Range`, or `None` for a degenerate chunk
    pub fn range(&self) -> Option<Range> {
        if self.is_empty() {
            None
        } else {
            Range::new(self.lower, self.upper).ok()
        }
    }

    /// Number of integers in this chunk
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.upper - self.lower + 1
        }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "chunk {} (empty)", self.index)
        } else {
            write!(f, "chunk {} [{}, {}]", self.index, self.lower, self.upper)
        }
    }
}

/// Split `range` into `n` ordered work items
///
/// Worker `i` starts at `start + i * step` with `step = len / n`; every worker
/// but the last ends at `lower + step - 1` and the last ends at `range.end()`.
pub fn partition(range: Range, n: usize) -> Result<Vec<WorkItem>, RoundError> {
    if n == 0 {
        return Err(RoundError::InvalidPartition(
            "worker count must be at least 1".to_string(),
        ));
    }

    let step = range.len() / n as u64;
    let items = (0..n)
        .map(|i| {
            let lower = range.start() + i as u64 * step;
            let upper = if i == n - 1 {
                range.end()
            } else {
                // step == 0 yields lower - 1, an empty chunk; lower >= 1 so no underflow
                lower + step - 1
            };
            WorkItem { index: i, lower, upper }
        })
        .collect();

    Ok(items)
}
