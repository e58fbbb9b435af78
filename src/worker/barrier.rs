//! Round barrier
//!
//! A join barrier for fire-and-join rounds: every task deposits exactly one
//! result through a cloned sender, and the orchestrator blocks until the
//! expected number of results has arrived. An optional deadline turns the
//! unbounded wait into a bounded one without changing the call sites.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// Why a barrier released before every task reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarrierError {
    /// The deadline elapsed; `missing` lists the tasks that never reported
    TimedOut { missing: Vec<usize> },
    /// Every sender was dropped while tasks were still outstanding
    Disconnected { missing: Vec<usize> },
}

impl BarrierError {
    pub fn missing(&self) -> &[usize] {
        match self {
            BarrierError::TimedOut { missing } | BarrierError::Disconnected { missing } => missing,
        }
    }
}

/// Collection point for one round of `expected` tasks, indexed `0..expected`
pub struct RoundBarrier<T> {
    expected: usize,
    tx: Sender<(usize, T)>,
    rx: Receiver<(usize, T)>,
}

impl<T> RoundBarrier<T> {
    pub fn new(expected: usize) -> Self {
        let (tx, rx) = channel::unbounded();
        Self { expected, tx, rx }
    }

    /// Sender handed to one task
    pub fn sender(&self) -> Sender<(usize, T)> {
        self.tx.clone()
    }

    /// Block until every task has reported
    pub fn wait(self) -> Result<Vec<(usize, T)>, BarrierError> {
        self.wait_timeout(None)
    }

    /// Block until every task has reported or `timeout` elapses
    ///
    /// Results are returned ordered by task index.
    pub fn wait_timeout(self, timeout: Option<Duration>) -> Result<Vec<(usize, T)>, BarrierError> {
        let RoundBarrier { expected, tx, rx } = self;
        // Only task senders may keep the channel open
        drop(tx);

        let deadline = timeout.map(|t| Instant::now() + t);
        let mut arrived: Vec<(usize, T)> = Vec::with_capacity(expected);

        while arrived.len() < expected {
            let received = match deadline {
                Some(deadline) => rx.recv_deadline(deadline),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(item) => arrived.push(item),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(BarrierError::TimedOut {
                        missing: missing(expected, &arrived),
                    })
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(BarrierError::Disconnected {
                        missing: missing(expected, &arrived),
                    })
                }
            }
        }

        arrived.sort_by_key(|(index, _)| *index);
        Ok(arrived)
    }
}

fn missing<T>(expected: usize, arrived: &[(usize, T)]) -> Vec<usize> {
    let seen: BTreeSet<usize> = arrived.iter().map(|(index, _)| *index).collect();
    (0..expected).filter(|i| !seen.contains(i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_wait_collects_all_in_index_order() {
        let barrier = RoundBarrier::new(4);
        let handles: Vec<_> = (0..4)
            .rev()
            .map(|i| {
                let tx = barrier.sender();
                thread::spawn(move || tx.send((i, i * 10)).unwrap())
            })
            .collect();

        let results = barrier.wait().unwrap();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(results, vec![(0, 0), (1, 10), (2, 20), (3, 30)]);
    }

    #[test]
    fn test_dropped_sender_reports_missing_task() {
        let barrier: RoundBarrier<u32> = RoundBarrier::new(2);
        let tx = barrier.sender();
        tx.send((1, 7)).unwrap();
        drop(tx);

        let err = barrier.wait().unwrap_err();
        assert_eq!(err, BarrierError::Disconnected { missing: vec![0] });
    }

    #[test]
    fn test_timeout_reports_missing_task() {
        let barrier: RoundBarrier<u32> = RoundBarrier::new(2);
        let tx = barrier.sender();
        tx.send((0, 1)).unwrap();

        let err = barrier.wait_timeout(Some(Duration::from_millis(50))).unwrap_err();
        assert!(matches!(err, BarrierError::TimedOut { .. }));
        assert_eq!(err.missing(), &[1]);
        drop(tx);
    }

    #[test]
    fn test_zero_expected_returns_immediately() {
        let barrier: RoundBarrier<u32> = RoundBarrier::new(0);
        assert!(barrier.wait().unwrap().is_empty());
    }
}
