//! Strategy comparison
//!
//! Runs every range under each selected strategy, checks that all strategies
//! agree on the findings and reports speedup against the sequential baseline.
//! The network strategy runs on loopback with in-process agents, so a bench
//! needs no external workers.

use super::{timed, RoundHistory, Strategy};
use crate::analyzer::DivisorSumAnalyzer;
use crate::config::{Config, NetworkConfig};
use crate::distributed::{Agent, Coordinator};
use crate::error::RoundError;
use crate::partition::Range;
use crate::results::AggregateResult;
use crate::util::time::speedup;
use crate::worker::{run_sequential, LocalOrchestrator};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// One strategy over one range
#[derive(Debug, Clone, PartialEq)]
pub struct BenchRow {
    pub range: Range,
    pub strategy: Strategy,
    pub worker_count: usize,
    pub elapsed: Duration,
    pub perfect_numbers: usize,
    pub amicable_pairs: usize,
    /// Sequential time divided by this row's time, when a baseline ran
    pub speedup: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct BenchReport {
    rows: Vec<BenchRow>,
}

impl BenchReport {
    pub fn rows(&self) -> &[BenchRow] {
        &self.rows
    }

    pub fn row(&self, range: Range, strategy: Strategy) -> Option<&BenchRow> {
        self.rows.iter().find(|r| r.range == range && r.strategy == strategy)
    }
}

/// Benchmark session over a list of ranges
pub struct BenchSession {
    ranges: Vec<Range>,
    worker_count: usize,
    strategies: Vec<Strategy>,
    network: NetworkConfig,
    local_timeout: Option<Duration>,
}

impl BenchSession {
    pub fn new(ranges: Vec<Range>, worker_count: usize, strategies: Vec<Strategy>) -> Self {
        Self {
            ranges,
            worker_count,
            strategies,
            network: NetworkConfig::default(),
            local_timeout: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, RoundError> {
        Ok(Self::new(config.run.ranges()?, config.run.workers, config.run.strategies.clone())
            .with_network(config.network.clone())
            .with_local_timeout(config.run.local_timeout()))
    }

    /// Timeouts and reassignment for network rounds; the bind address is ignored
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    pub fn with_local_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.local_timeout = timeout;
        self
    }

    /// Run every range under every strategy, recording each round in `history`
    pub fn run(&self, history: &mut RoundHistory) -> Result<BenchReport, RoundError> {
        let runtime = if self.strategies.contains(&Strategy::Network) {
            Some(Runtime::new().map_err(|e| {
                RoundError::connection(None, "loopback", format!("failed to start runtime: {}", e))
            })?)
        } else {
            None
        };

        let mut report = BenchReport::default();
        for &range in &self.ranges {
            info!(%range, "benchmarking range");
            let mut reference: Option<(Strategy, AggregateResult)> = None;
            let mut rows = Vec::with_capacity(self.strategies.len());

            for &strategy in &self.strategies {
                let workers = match strategy {
                    Strategy::Sequential => 1,
                    _ => self.worker_count,
                };
                let result = timed(history, strategy, range, workers, |range, workers| match strategy {
                    Strategy::Sequential => run_sequential(range),
                    Strategy::Local => LocalOrchestrator::new(DivisorSumAnalyzer)
                        .with_timeout(self.local_timeout)
                        .run(range, workers),
                    Strategy::Network => match &runtime {
                        Some(runtime) => runtime.block_on(self.network_round(range, workers)),
                        None => Err(RoundError::connection(None, "loopback", "no runtime for network rounds")),
                    },
                })?;
                debug!(%strategy, elapsed_ms = result.elapsed().as_millis() as u64, "strategy finished");

                match &reference {
                    Some((first, expected)) if !expected.same_findings(&result) => {
                        return Err(RoundError::AggregationError(format!(
                            "{} and {} disagree on range {}",
                            first, strategy, range
                        )));
                    }
                    Some(_) => {}
                    None => reference = Some((strategy, result.clone())),
                }

                rows.push(BenchRow {
                    range,
                    strategy,
                    worker_count: workers,
                    elapsed: result.elapsed(),
                    perfect_numbers: result.perfect_numbers().len(),
                    amicable_pairs: result.amicable_pairs().len(),
                    speedup: None,
                });
            }

            let baseline = rows
                .iter()
                .find(|r| r.strategy == Strategy::Sequential)
                .map(|r| r.elapsed);
            if let Some(baseline) = baseline {
                for row in &mut rows {
                    row.speedup = speedup(baseline, row.elapsed);
                }
            }
            report.rows.extend(rows);
        }

        Ok(report)
    }

    /// Coordinator plus `workers` in-process agents on an ephemeral loopback port
    async fn network_round(&self, range: Range, workers: usize) -> Result<AggregateResult, RoundError> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| RoundError::connection(None, "127.0.0.1:0", format!("failed to bind: {}", e)))?;
        let addr = listener
            .local_addr()
            .map_err(|e| RoundError::connection(None, "127.0.0.1:0", e.to_string()))?
            .to_string();

        let agent_config = NetworkConfig {
            bind: addr,
            ..self.network.clone()
        };
        let agents: Vec<_> = (0..workers)
            .map(|_| {
                let agent = Agent::new(&agent_config);
                tokio::spawn(async move { agent.run_once().await })
            })
            .collect();

        let mut coordinator = Coordinator::new(self.network.clone());
        let result = coordinator.run_round_on(listener, range, workers).await;

        for agent in agents {
            if let Ok(Err(e)) = agent.await {
                debug!(error = %e, "loopback agent failed");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u64, end: u64) -> Range {
        Range::new(start, end).unwrap()
    }

    #[test]
    fn test_bench_sequential_and_local() {
        let session = BenchSession::new(
            vec![range(1, 2_000), range(1, 6_000)],
            3,
            vec![Strategy::Sequential, Strategy::Local],
        );
        let mut history = RoundHistory::new();
        let report = session.run(&mut history).unwrap();

        assert_eq!(report.rows().len(), 4);
        assert_eq!(history.len(), 4);

        let seq = report.row(range(1, 6_000), Strategy::Sequential).unwrap();
        assert_eq!(seq.worker_count, 1);
        assert_eq!(seq.perfect_numbers, 3);
        assert_eq!(seq.amicable_pairs, 4);
        assert!(seq.speedup.is_some());

        let local = report.row(range(1, 6_000), Strategy::Local).unwrap();
        assert_eq!(local.worker_count, 3);
        assert_eq!(local.amicable_pairs, seq.amicable_pairs);
    }

    #[test]
    fn test_bench_without_baseline_has_no_speedup() {
        let session = BenchSession::new(vec![range(1, 500)], 2, vec![Strategy::Local]);
        let report = session.run(&mut RoundHistory::new()).unwrap();
        assert!(report.rows()[0].speedup.is_none());
    }

    #[test]
    fn test_bench_network_loopback() {
        let session = BenchSession::new(
            vec![range(1, 3_000)],
            2,
            vec![Strategy::Sequential, Strategy::Network],
        );
        let mut history = RoundHistory::new();
        let report = session.run(&mut history).unwrap();

        let network = report.row(range(1, 3_000), Strategy::Network).unwrap();
        assert_eq!(network.worker_count, 2);
        assert_eq!(network.perfect_numbers, 3);
        assert_eq!(network.amicable_pairs, 3);
        assert_eq!(history.for_strategy(Strategy::Network).count(), 1);
    }

    #[test]
    fn test_bench_zero_workers_fails() {
        let session = BenchSession::new(vec![range(1, 100)], 0, vec![Strategy::Local]);
        let mut history = RoundHistory::new();
        assert!(session.run(&mut history).is_err());
        assert!(history.is_empty());
    }
}
