//! Round error taxonomy
//!
//! Every failure inside a distribution round is fatal to that round. The
//! variants identify which chunk or connection failed so the caller can
//! report it without ever seeing a partial aggregate.

use thiserror::Error;

/// Errors raised while partitioning, dispatching, computing or aggregating a round
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundError {
    /// Bad range or worker count, rejected before dispatch
    #[error("invalid partition: {0}")]
    InvalidPartition(String),

    /// A worker never connected, dropped mid-exchange, or timed out
    #[error("connection failure{} with {peer}: {reason}", chunk_label(.chunk))]
    ConnectionFailure {
        chunk: Option<usize>,
        peer: String,
        reason: String,
    },

    /// A partial result failed schema validation
    #[error("aggregation error: {0}")]
    AggregationError(String),

    /// The chunk analyzer failed on its assigned range
    #[error("analyzer failure on chunk {chunk}: {reason}")]
    AnalyzerFailure { chunk: usize, reason: String },
}

fn chunk_label(chunk: &Option<usize>) -> String {
    match chunk {
        Some(index) => format!(" on chunk {}", index),
        None => String::new(),
    }
}

impl RoundError {
    /// Chunk index the error is attributed to, if any
    pub fn chunk(&self) -> Option<usize> {
        match self {
            RoundError::ConnectionFailure { chunk, .. } => *chunk,
            RoundError::AnalyzerFailure { chunk, .. } => Some(*chunk),
            _ => None,
        }
    }

    pub(crate) fn connection(chunk: Option<usize>, peer: impl Into<String>, reason: impl Into<String>) -> Self {
        RoundError::ConnectionFailure {
            chunk,
            peer: peer.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failure_message_names_chunk() {
        let err = RoundError::connection(Some(2), "127.0.0.1:5000", "peer closed");
        assert_eq!(
            err.to_string(),
            "connection failure on chunk 2 with 127.0.0.1:5000: peer closed"
        );
        assert_eq!(err.chunk(), Some(2));
    }

    #[test]
    fn test_connection_failure_without_chunk() {
        let err = RoundError::connection(None, "0.0.0.0:12345", "accept timed out");
        assert_eq!(err.to_string(), "connection failure with 0.0.0.0:12345: accept timed out");
        assert_eq!(err.chunk(), None);
    }

    #[test]
    fn test_analyzer_failure_chunk() {
        let err = RoundError::AnalyzerFailure { chunk: 4, reason: "overflow".into() };
        assert_eq!(err.chunk(), Some(4));
        assert!(err.to_string().contains("chunk 4"));
    }
}
