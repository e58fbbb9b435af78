//! Network worker
//!
//! An agent connects to the coordinator, receives one chunk assignment,
//! analyzes it on a blocking thread and sends back a single reply before
//! closing the connection. Long-lived agents repeat this per round.

use crate::analyzer::{ChunkAnalyzer, DivisorSumAnalyzer};
use crate::config::NetworkConfig;
use crate::distributed::protocol::*;
use crate::error::RoundError;
use crate::partition::WorkItem;
use crate::util::time::Stopwatch;
use crate::worker::analyze_item;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Delay between connection attempts while the coordinator is not up yet
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Summary of one served assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedChunk {
    pub round_id: u64,
    pub item: WorkItem,
    pub perfect_numbers: usize,
    pub amicable_pairs: usize,
    pub compute: Duration,
}

/// Network worker
pub struct Agent {
    /// Coordinator address (host:port)
    coordinator: String,

    analyzer: Arc<dyn ChunkAnalyzer>,

    /// How long to keep retrying the initial connect
    connect_retry: Duration,

    worker_id: String,
}

impl Agent {
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            coordinator: config.bind.clone(),
            analyzer: Arc::new(DivisorSumAnalyzer),
            connect_retry: config.connect_retry(),
            worker_id: worker_id(),
        }
    }

    pub fn with_analyzer<A: ChunkAnalyzer + 'static>(mut self, analyzer: A) -> Self {
        self.analyzer = Arc::new(analyzer);
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Serve rounds until `max_rounds` have completed
    ///
    /// With no limit the agent serves until the coordinator stops listening.
    /// After at least one served round that is a normal end of the run.
    pub async fn run(&self, max_rounds: Option<usize>) -> Result<usize, RoundError> {
        let mut served = 0;
        while max_rounds.map_or(true, |max| served < max) {
            let chunk = match self.run_once().await {
                Ok(chunk) => chunk,
                Err(RoundError::ConnectionFailure { chunk: None, reason, .. })
                    if max_rounds.is_none() && served > 0 =>
                {
                    info!(served, %reason, "coordinator gone, stopping");
                    return Ok(served);
                }
                Err(e) => return Err(e),
            };
            served += 1;
            info!(
                round_id = chunk.round_id,
                chunk = chunk.item.index,
                served,
                "assignment complete"
            );
        }
        Ok(served)
    }

    /// Serve exactly one assignment
    pub async fn run_once(&self) -> Result<ServedChunk, RoundError> {
        let mut stream = self.connect().await?;
        let peer = self.coordinator.as_str();

        let assign = match read_message(&mut stream).await.map_err(|e| e.into_round_error(None, peer))? {
            Message::Assign(assign) => assign,
            other => {
                return Err(RoundError::AggregationError(format!(
                    "expected ASSIGN from {}, got {:?}",
                    peer, other
                )))
            }
        };
        let chunk = assign.chunk;

        if assign.protocol_version != PROTOCOL_VERSION {
            let reason = format!(
                "protocol version mismatch: expected {}, got {}",
                PROTOCOL_VERSION, assign.protocol_version
            );
            self.report_error(&mut stream, chunk, FailureKind::VersionMismatch, &reason)
                .await;
            return Err(RoundError::connection(Some(chunk), peer, reason));
        }

        let item = match assign.work_item() {
            Ok(item) => item,
            Err(e) => {
                self.report_error(&mut stream, chunk, FailureKind::Analysis, &e.to_string())
                    .await;
                return Err(e);
            }
        };
        debug!(%item, round_id = assign.round_id, "assignment received");

        let analyzer = Arc::clone(&self.analyzer);
        let stopwatch = Stopwatch::start();
        let outcome = tokio::task::spawn_blocking(move || analyze_item(analyzer.as_ref(), &item))
            .await
            .map_err(|e| RoundError::AnalyzerFailure {
                chunk,
                reason: format!("analysis task failed: {}", e),
            })
            .and_then(|outcome| outcome);
        let compute = stopwatch.elapsed();

        let partial = match outcome {
            Ok(partial) => partial,
            Err(e) => {
                self.report_error(&mut stream, chunk, FailureKind::Analysis, &e.to_string())
                    .await;
                return Err(e);
            }
        };

        let reply = ResultMessage::new(
            assign.round_id,
            chunk,
            self.worker_id.clone(),
            &partial,
            compute.as_nanos() as u64,
        );
        write_message(&mut stream, &Message::Result(reply))
            .await
            .map_err(|e| e.into_round_error(Some(chunk), peer))?;

        Ok(ServedChunk {
            round_id: assign.round_id,
            item,
            perfect_numbers: partial.perfect_numbers().len(),
            amicable_pairs: partial.amicable_pairs().len(),
            compute,
        })
    }

    async fn connect(&self) -> Result<TcpStream, RoundError> {
        let deadline = Instant::now() + self.connect_retry;
        loop {
            match TcpStream::connect(&self.coordinator).await {
                Ok(stream) => {
                    debug!(coordinator = %self.coordinator, "connected");
                    return Ok(stream);
                }
                Err(e) if Instant::now() < deadline => {
                    debug!(error = %e, "coordinator not reachable yet, retrying");
                    tokio::time::sleep(RETRY_INTERVAL).await;
                }
                Err(e) => {
                    return Err(RoundError::connection(
                        None,
                        &self.coordinator,
                        format!("failed to connect: {}", e),
                    ))
                }
            }
        }
    }

    /// Best effort; the coordinator may already be gone
    async fn report_error(&self, stream: &mut TcpStream, chunk: usize, kind: FailureKind, error: &str) {
        let msg = Message::Error(ErrorMessage {
            worker_id: self.worker_id.clone(),
            chunk,
            kind,
            error: error.to_string(),
        });
        if let Err(e) = write_message(stream, &msg).await {
            warn!(error = %e, "failed to report error to coordinator");
        }
    }
}

/// Hostname plus pid, so several agents on one host stay distinguishable
fn worker_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}:{}", host, std::process::id())
}
