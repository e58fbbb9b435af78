//! Round history
//!
//! Rows of `(strategy, range, worker_count, elapsed)` collected by whoever
//! runs the rounds. The history is a plain value owned by the caller and
//! handed to output sinks once the session is over.

use super::Strategy;
use crate::partition::Range;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// One timed round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRecord {
    pub strategy: Strategy,
    pub range: Range,
    pub worker_count: usize,
    pub elapsed: Duration,
    pub recorded_at: DateTime<Utc>,
}

impl RoundRecord {
    pub fn new(strategy: Strategy, range: Range, worker_count: usize, elapsed: Duration) -> Self {
        Self {
            strategy,
            range,
            worker_count,
            elapsed,
            recorded_at: Utc::now(),
        }
    }
}

/// Append-only list of timed rounds
#[derive(Debug, Clone, Default)]
pub struct RoundHistory {
    records: Vec<RoundRecord>,
}

impl RoundHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: RoundRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[RoundRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn for_strategy(&self, strategy: Strategy) -> impl Iterator<Item = &RoundRecord> {
        self.records.iter().filter(move |r| r.strategy == strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(end: u64) -> Range {
        Range::new(1, end).unwrap()
    }

    #[test]
    fn test_record_keeps_order() {
        let mut history = RoundHistory::new();
        assert!(history.is_empty());

        history.record(RoundRecord::new(Strategy::Sequential, range(100), 1, Duration::from_millis(5)));
        history.record(RoundRecord::new(Strategy::Local, range(100), 4, Duration::from_millis(2)));
        history.record(RoundRecord::new(Strategy::Local, range(500), 4, Duration::from_millis(9)));

        assert_eq!(history.len(), 3);
        let strategies: Vec<Strategy> = history.records().iter().map(|r| r.strategy).collect();
        assert_eq!(strategies, vec![Strategy::Sequential, Strategy::Local, Strategy::Local]);
        assert_eq!(history.for_strategy(Strategy::Local).count(), 2);
        assert_eq!(history.for_strategy(Strategy::Network).count(), 0);
    }

    #[test]
    fn test_histories_are_independent() {
        let mut first = RoundHistory::new();
        let second = RoundHistory::new();
        first.record(RoundRecord::new(Strategy::Sequential, range(10), 1, Duration::ZERO));
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }
}
