//! Network coordinator
//!
//! The coordinator drives one round at a time:
//! - Binds the configured address
//! - Accepts exactly `worker_count` worker connections
//! - Partitions the range and assigns chunks in acceptance order
//! - Collects one reply per connection on its own task
//! - Aggregates the replies once every task has finished
//!
//! Listener and connections live for one round only.

use crate::analyzer::{ChunkAnalyzer, DivisorSumAnalyzer};
use crate::config::NetworkConfig;
use crate::distributed::protocol::*;
use crate::error::RoundError;
use crate::harness::{RoundHistory, RoundRecord, Strategy};
use crate::partition::{partition, Range, WorkItem};
use crate::results::{AggregateResult, Aggregator, PartialResult};
use crate::util::time::Stopwatch;
use crate::worker::analyze_item;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Network round orchestrator
pub struct Coordinator {
    config: NetworkConfig,

    /// Used only when failed chunks are reassigned locally
    analyzer: Arc<dyn ChunkAnalyzer>,

    /// Incremented per round and echoed by workers
    next_round_id: u64,
}

impl Coordinator {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            analyzer: Arc::new(DivisorSumAnalyzer),
            next_round_id: 1,
        }
    }

    pub fn with_analyzer<A: ChunkAnalyzer + 'static>(mut self, analyzer: A) -> Self {
        self.analyzer = Arc::new(analyzer);
        self
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener, RoundError> {
        TcpListener::bind(&self.config.bind)
            .await
            .map_err(|e| RoundError::connection(None, &self.config.bind, format!("failed to bind: {}", e)))
    }

    /// Run one round on a freshly bound listener
    pub async fn run_round(&mut self, range: Range, worker_count: usize) -> Result<AggregateResult, RoundError> {
        // Reject a bad worker count before anyone connects
        partition(range, worker_count)?;
        let listener = self.bind().await?;
        self.run_round_on(listener, range, worker_count).await
    }

    /// Run one round on an already bound listener, consuming it
    pub async fn run_round_on(
        &mut self,
        listener: TcpListener,
        range: Range,
        worker_count: usize,
    ) -> Result<AggregateResult, RoundError> {
        let items = partition(range, worker_count)?;
        let round_id = self.next_round_id;
        self.next_round_id += 1;

        let local = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| self.config.bind.clone());
        info!(round_id, range = %range, workers = worker_count, addr = %local, "waiting for workers");

        let connections = self.accept_workers(&listener, worker_count).await?;
        drop(listener);

        let stopwatch = Stopwatch::start();
        let collect_timeout = self.config.collect_timeout();

        let mut handles: Vec<(WorkItem, String, JoinHandle<Result<PartialResult, RoundError>>)> =
            Vec::with_capacity(items.len());
        for (item, (stream, peer)) in items.into_iter().zip(connections) {
            let peer = peer.to_string();
            debug!(%item, %peer, "assigning chunk");
            let assign = AssignMessage::new(round_id, &item);
            let handle = tokio::spawn(exchange(stream, peer.clone(), assign, collect_timeout));
            handles.push((item, peer, handle));
        }

        // Join barrier: every connection task finishes before anything is merged
        let mut outcomes = Vec::with_capacity(handles.len());
        for (item, peer, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(RoundError::connection(
                    Some(item.index),
                    &peer,
                    format!("collector task failed: {}", e),
                )),
            };
            outcomes.push((item, outcome));
        }

        let mut aggregator = Aggregator::within(range);
        for (item, outcome) in outcomes {
            let partial = match outcome {
                Ok(partial) => partial,
                Err(err @ RoundError::ConnectionFailure { .. }) if self.config.reassign_locally => {
                    warn!(chunk = item.index, error = %err, "reassigning chunk locally");
                    self.analyze_locally(item).await?
                }
                Err(err) => {
                    warn!(round_id, error = %err, "round failed");
                    return Err(err);
                }
            };
            aggregator.add_partial(item.index, partial)?;
        }

        let result = aggregator.aggregate(worker_count).with_elapsed(stopwatch.elapsed());
        info!(
            round_id,
            perfect = result.perfect_numbers().len(),
            pairs = result.amicable_pairs().len(),
            elapsed_ms = result.elapsed().as_millis() as u64,
            "network round complete"
        );

        Ok(result)
    }

    /// Run several rounds back to back, recording each in `history`
    pub async fn run_rounds(
        &mut self,
        ranges: &[Range],
        worker_count: usize,
        history: &mut RoundHistory,
    ) -> Result<Vec<AggregateResult>, RoundError> {
        let mut results = Vec::with_capacity(ranges.len());
        for &range in ranges {
            let result = self.run_round(range, worker_count).await?;
            history.record(RoundRecord::new(Strategy::Network, range, worker_count, result.elapsed()));
            results.push(result);
        }
        Ok(results)
    }

    async fn accept_workers(
        &self,
        listener: &TcpListener,
        worker_count: usize,
    ) -> Result<Vec<(TcpStream, SocketAddr)>, RoundError> {
        let accept_timeout = self.config.accept_timeout();
        let mut connections = Vec::with_capacity(worker_count);

        while connections.len() < worker_count {
            let accepted = match accept_timeout {
                Some(timeout) => tokio::time::timeout(timeout, listener.accept()).await.map_err(|_| {
                    RoundError::connection(
                        None,
                        &self.config.bind,
                        format!(
                            "only {} of {} workers connected within {:?}",
                            connections.len(),
                            worker_count,
                            timeout
                        ),
                    )
                })?,
                None => listener.accept().await,
            };

            let (stream, peer) = accepted
                .map_err(|e| RoundError::connection(None, &self.config.bind, format!("accept failed: {}", e)))?;
            info!(%peer, connected = connections.len() + 1, expected = worker_count, "worker connected");
            connections.push((stream, peer));
        }

        Ok(connections)
    }

    async fn analyze_locally(&self, item: WorkItem) -> Result<PartialResult, RoundError> {
        let analyzer = Arc::clone(&self.analyzer);
        tokio::task::spawn_blocking(move || analyze_item(analyzer.as_ref(), &item))
            .await
            .map_err(|e| RoundError::AnalyzerFailure {
                chunk: item.index,
                reason: format!("local reassignment failed: {}", e),
            })?
    }
}

/// Send one assignment and wait for the single reply
async fn exchange(
    mut stream: TcpStream,
    peer: String,
    assign: AssignMessage,
    collect_timeout: Option<Duration>,
) -> Result<PartialResult, RoundError> {
    let chunk = assign.chunk;
    let round_id = assign.round_id;

    write_message(&mut stream, &Message::Assign(assign))
        .await
        .map_err(|e| e.into_round_error(Some(chunk), &peer))?;

    let reply = match collect_timeout {
        Some(timeout) => tokio::time::timeout(timeout, read_message(&mut stream))
            .await
            .map_err(|_| RoundError::connection(Some(chunk), &peer, format!("no reply within {:?}", timeout)))?,
        None => read_message(&mut stream).await,
    }
    .map_err(|e| e.into_round_error(Some(chunk), &peer))?;

    match reply {
        Message::Result(result) => {
            if result.protocol_version != PROTOCOL_VERSION {
                return Err(RoundError::connection(
                    Some(chunk),
                    &peer,
                    format!(
                        "protocol version mismatch: expected {}, got {}",
                        PROTOCOL_VERSION, result.protocol_version
                    ),
                ));
            }
            if result.round_id != round_id || result.chunk != chunk {
                return Err(RoundError::AggregationError(format!(
                    "{} answered round {} chunk {}, expected round {} chunk {}",
                    peer, result.round_id, result.chunk, round_id, chunk
                )));
            }
            debug!(
                chunk,
                worker = %result.worker_id,
                compute_us = result.compute_ns / 1_000,
                "result received"
            );
            result.into_partial()
        }
        Message::Error(err) => Err(err.into_round_error(&peer)),
        other => Err(RoundError::AggregationError(format!(
            "expected RESULT from {}, got {:?}",
            peer, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::AnalyzeError;
    use crate::distributed::agent::Agent;
    use crate::worker::run_local;

    fn range(start: u64, end: u64) -> Range {
        Range::new(start, end).unwrap()
    }

    fn test_config() -> NetworkConfig {
        NetworkConfig {
            bind: "127.0.0.1:0".to_string(),
            collect_timeout_secs: Some(10),
            ..NetworkConfig::default()
        }
    }

    async fn ephemeral() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    fn agent_config(addr: &str) -> NetworkConfig {
        NetworkConfig {
            bind: addr.to_string(),
            connect_retry_secs: 5,
            ..NetworkConfig::default()
        }
    }

    #[tokio::test]
    async fn test_network_round_single_worker() {
        let (listener, addr) = ephemeral().await;
        let agent = Agent::new(&agent_config(&addr));
        let worker = tokio::spawn(async move { agent.run_once().await });

        let mut coordinator = Coordinator::new(test_config());
        let result = coordinator.run_round_on(listener, range(1, 10_000), 1).await.unwrap();
        worker.await.unwrap().unwrap();

        assert_eq!(result.perfect_numbers(), &[6, 28, 496, 8128]);
        assert_eq!(
            result.amicable_pairs(),
            &[(220, 284), (1184, 1210), (2620, 2924), (5020, 5564), (6232, 6368)]
        );
        assert_eq!(result.worker_count(), 1);
    }

    async fn network_round(r: Range, worker_count: usize) -> AggregateResult {
        let (listener, addr) = ephemeral().await;
        let workers: Vec<_> = (0..worker_count)
            .map(|_| {
                let agent = Agent::new(&agent_config(&addr));
                tokio::spawn(async move { agent.run_once().await })
            })
            .collect();

        let mut coordinator = Coordinator::new(test_config());
        let result = coordinator.run_round_on(listener, r, worker_count).await.unwrap();
        for worker in workers {
            worker.await.unwrap().unwrap();
        }
        result
    }

    #[tokio::test]
    async fn test_network_matches_local() {
        // Includes more workers than numbers, so some chunks are empty
        let cases = [
            (range(1, 3_000), 3),
            (range(1, 9), 1),
            (range(1, 9), 2),
            (range(1, 9), 5),
            (range(1, 9), 12),
        ];
        for (r, workers) in cases {
            let network = network_round(r, workers).await;
            let local = run_local(r, workers).unwrap();
            assert!(network.same_findings(&local), "mismatch on {} with {} workers", r, workers);
            assert_eq!(network.worker_count(), workers);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_rounds_back_to_back() {
        // Every round rebinds this same port
        let addr = {
            let (listener, addr) = ephemeral().await;
            drop(listener);
            addr
        };
        let agents: Vec<_> = (0..2)
            .map(|_| {
                let agent = Agent::new(&agent_config(&addr));
                tokio::spawn(async move { agent.run(Some(3)).await })
            })
            .collect();

        let config = NetworkConfig {
            bind: addr.clone(),
            ..test_config()
        };
        let mut coordinator = Coordinator::new(config);
        assert_eq!(coordinator.config().bind, addr);
        let ranges = [range(1, 300), range(1, 3_000), range(1, 7_000)];
        let mut history = RoundHistory::new();
        let results = coordinator.run_rounds(&ranges, 2, &mut history).await.unwrap();
        for agent in agents {
            assert_eq!(agent.await.unwrap().unwrap(), 3);
        }

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].amicable_pairs(), &[(220, 284)]);
        assert_eq!(results[1].amicable_pairs(), &[(220, 284), (1184, 1210), (2620, 2924)]);
        assert_eq!(results[2].perfect_numbers(), &[6, 28, 496]);
        assert_eq!(
            results[2].amicable_pairs(),
            &[(220, 284), (1184, 1210), (2620, 2924), (5020, 5564), (6232, 6368)]
        );

        assert_eq!(history.len(), 3);
        assert!(history
            .records()
            .iter()
            .all(|r| r.strategy == Strategy::Network && r.worker_count == 2));
        let recorded: Vec<Range> = history.records().iter().map(|r| r.range).collect();
        assert_eq!(recorded, ranges);
    }

    #[tokio::test]
    async fn test_disconnecting_worker_fails_round() {
        let (listener, addr) = ephemeral().await;

        let good = Agent::new(&agent_config(&addr));
        let good_worker = tokio::spawn(async move { good.run_once().await });

        // Second connection reads its assignment and hangs up without replying
        let rude = tokio::spawn({
            let addr = addr.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                let mut stream = TcpStream::connect(&addr).await.unwrap();
                let _ = read_message(&mut stream).await.unwrap();
            }
        });

        let mut coordinator = Coordinator::new(test_config());
        let err = coordinator.run_round_on(listener, range(1, 1_000), 2).await.unwrap_err();
        rude.await.unwrap();
        let _ = good_worker.await.unwrap();

        assert!(matches!(err, RoundError::ConnectionFailure { .. }));
        assert!(err.chunk().is_some());
    }

    #[tokio::test]
    async fn test_reassign_locally_recovers_round() {
        let (listener, addr) = ephemeral().await;
        let rude = tokio::spawn({
            let addr = addr.clone();
            async move {
                let stream = TcpStream::connect(&addr).await.unwrap();
                drop(stream);
            }
        });

        let config = NetworkConfig {
            reassign_locally: true,
            ..test_config()
        };
        let mut coordinator = Coordinator::new(config);
        let result = coordinator.run_round_on(listener, range(1, 300), 1).await.unwrap();
        rude.await.unwrap();

        assert_eq!(result.perfect_numbers(), &[6, 28]);
        assert_eq!(result.amicable_pairs(), &[(220, 284)]);
    }

    #[tokio::test]
    async fn test_agent_analyzer_failure_reported() {
        let (listener, addr) = ephemeral().await;
        let failing = |_r: Range| -> Result<PartialResult, AnalyzeError> { Err(AnalyzeError::Overflow(7)) };
        let agent = Agent::new(&agent_config(&addr)).with_analyzer(failing);
        let worker = tokio::spawn(async move { agent.run_once().await });

        let mut coordinator = Coordinator::new(test_config());
        let err = coordinator.run_round_on(listener, range(1, 100), 1).await.unwrap_err();
        assert!(worker.await.unwrap().is_err());

        assert!(matches!(err, RoundError::AnalyzerFailure { chunk: 0, .. }));
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        let (listener, addr) = ephemeral().await;
        let impostor = tokio::spawn(async move {
            let mut stream = TcpStream::connect(&addr).await.unwrap();
            let Message::Assign(assign) = read_message(&mut stream).await.unwrap() else {
                panic!("expected assignment");
            };
            let mut reply = ResultMessage::new(assign.round_id, assign.chunk, "old".into(), &PartialResult::new(), 0);
            reply.protocol_version = PROTOCOL_VERSION + 1;
            write_message(&mut stream, &Message::Result(reply)).await.unwrap();
        });

        let mut coordinator = Coordinator::new(test_config());
        let err = coordinator.run_round_on(listener, range(1, 100), 1).await.unwrap_err();
        impostor.await.unwrap();

        assert!(matches!(err, RoundError::ConnectionFailure { chunk: Some(0), .. }));
    }

    fn spawn_refusing_worker(addr: String) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut stream = TcpStream::connect(&addr).await.unwrap();
            let Message::Assign(assign) = read_message(&mut stream).await.unwrap() else {
                panic!("expected assignment");
            };
            let refusal = ErrorMessage {
                worker_id: "old".into(),
                chunk: assign.chunk,
                kind: FailureKind::VersionMismatch,
                error: "protocol version mismatch".into(),
            };
            write_message(&mut stream, &Message::Error(refusal)).await.unwrap();
        })
    }

    #[tokio::test]
    async fn test_refused_version_is_connection_failure() {
        let (listener, addr) = ephemeral().await;
        let refusing = spawn_refusing_worker(addr);

        let mut coordinator = Coordinator::new(test_config());
        let err = coordinator.run_round_on(listener, range(1, 100), 1).await.unwrap_err();
        refusing.await.unwrap();

        assert!(matches!(err, RoundError::ConnectionFailure { chunk: Some(0), .. }));
    }

    #[tokio::test]
    async fn test_refused_version_reassigned_locally() {
        let (listener, addr) = ephemeral().await;
        let refusing = spawn_refusing_worker(addr);

        let config = NetworkConfig {
            reassign_locally: true,
            ..test_config()
        };
        let mut coordinator = Coordinator::new(config);
        let result = coordinator.run_round_on(listener, range(1, 300), 1).await.unwrap();
        refusing.await.unwrap();

        assert_eq!(result.perfect_numbers(), &[6, 28]);
        assert_eq!(result.amicable_pairs(), &[(220, 284)]);
    }

    #[tokio::test]
    async fn test_accept_timeout() {
        let (listener, _addr) = ephemeral().await;
        let config = NetworkConfig {
            accept_timeout_secs: Some(1),
            ..test_config()
        };
        let mut coordinator = Coordinator::new(config);
        let err = coordinator.run_round_on(listener, range(1, 100), 2).await.unwrap_err();
        assert!(matches!(err, RoundError::ConnectionFailure { chunk: None, .. }));
    }

    #[tokio::test]
    async fn test_zero_workers_rejected_before_bind() {
        let mut coordinator = Coordinator::new(test_config());
        let err = coordinator.run_round(range(1, 100), 0).await.unwrap_err();
        assert!(matches!(err, RoundError::InvalidPartition(_)));
    }
}
