//! Coordinator/worker wire protocol
//!
//! This module defines the messages exchanged between the coordinator and
//! network workers. Messages are plain data serialized with MessagePack
//! (rmp-serde); nothing received from a peer is trusted until it has been
//! decoded into these types and validated.
//!
//! # Protocol Version
//!
//! Current version: 1
//!
//! # Message Flow
//!
//! Each connection carries exactly one exchange and is then closed:
//!
//! ```text
//! Coordinator                     Worker
//!     |                              |
//!     |<------- connect -------------|
//!     |                              |
//!     |-------- ASSIGN(chunk) ------>|
//!     |                              |   analyze
//!     |<------- RESULT(findings) ----|
//!     |           or ERROR           |
//!     |                              |
//!     |-------- close -------------->|
//! ```
//!
//! # Message Framing
//!
//! Each message is prefixed with a 4-byte length field (little-endian u32):
//!
//! ```text
//! [4 bytes: message length][N bytes: MessagePack message]
//! ```

use crate::error::RoundError;
use crate::partition::WorkItem;
use crate::results::PartialResult;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version
///
/// Coordinator and workers must have matching protocol versions.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest accepted message body (16 MiB)
pub const MAX_MESSAGE_LEN: usize = 16 * 1024 * 1024;

/// Failures while moving a message across a connection
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Peer closed the connection before a complete message arrived
    #[error("connection closed by peer")]
    Closed,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("message too large: {0} bytes (max {MAX_MESSAGE_LEN})")]
    TooLarge(usize),

    #[error("failed to encode message: {0}")]
    Encode(String),

    /// Body was complete but did not match the message schema
    #[error("failed to decode message: {0}")]
    Decode(String),
}

impl ProtocolError {
    /// Map onto the round taxonomy: malformed payloads are aggregation
    /// errors, everything else is a connection failure
    pub fn into_round_error(self, chunk: Option<usize>, peer: &str) -> RoundError {
        match self {
            ProtocolError::Decode(reason) => {
                RoundError::AggregationError(format!("malformed message from {}: {}", peer, reason))
            }
            other => RoundError::connection(chunk, peer, other.to_string()),
        }
    }
}

/// Protocol message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Work assignment (Coordinator → Worker)
    Assign(AssignMessage),

    /// Findings for the assigned chunk (Worker → Coordinator)
    Result(ResultMessage),

    /// Worker could not serve its chunk (Worker → Coordinator)
    ///
    /// The coordinator fails the chunk with the error its kind maps to.
    Error(ErrorMessage),
}

/// Work assignment message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignMessage {
    pub protocol_version: u32,

    /// Round identifier echoed back in the result
    pub round_id: u64,

    /// Chunk index within the round
    pub chunk: usize,

    /// Inclusive bounds; `upper < lower` is an empty chunk
    pub lower: u64,
    pub upper: u64,
}

impl AssignMessage {
    pub fn new(round_id: u64, item: &WorkItem) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            round_id,
            chunk: item.index,
            lower: item.lower,
            upper: item.upper,
        }
    }

    /// The assignment as a work item, rejecting a zero lower bound
    pub fn work_item(&self) -> Result<WorkItem, RoundError> {
        if self.lower == 0 {
            return Err(RoundError::InvalidPartition(format!(
                "chunk {} has lower bound 0",
                self.chunk
            )));
        }
        Ok(WorkItem {
            index: self.chunk,
            lower: self.lower,
            upper: self.upper,
        })
    }
}

/// Result message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMessage {
    pub protocol_version: u32,
    pub round_id: u64,
    pub chunk: usize,

    /// Worker identifier (hostname and pid)
    pub worker_id: String,

    pub perfect_numbers: Vec<u64>,
    pub amicable_pairs: Vec<(u64, u64)>,

    /// Time spent analyzing (nanoseconds)
    pub compute_ns: u64,
}

impl ResultMessage {
    pub fn new(round_id: u64, chunk: usize, worker_id: String, partial: &PartialResult, compute_ns: u64) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            round_id,
            chunk,
            worker_id,
            perfect_numbers: partial.perfect_numbers().iter().copied().collect(),
            amicable_pairs: partial.amicable_pairs().iter().copied().collect(),
            compute_ns,
        }
    }

    /// Validate the payload and convert it into a partial result
    pub fn into_partial(self) -> Result<PartialResult, RoundError> {
        PartialResult::from_parts(self.perfect_numbers, self.amicable_pairs)
    }
}

/// What went wrong on the worker side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The chunk was received but could not be analyzed
    Analysis,

    /// The worker refused the assignment's protocol version
    VersionMismatch,
}

/// Error message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub worker_id: String,
    pub chunk: usize,
    pub kind: FailureKind,
    pub error: String,
}

impl ErrorMessage {
    /// Map onto the round taxonomy
    ///
    /// A refused version makes the peer unusable for this round, which is a
    /// connection failure; anything else is the analyzer's.
    pub fn into_round_error(self, peer: &str) -> RoundError {
        let reason = format!("{} reported: {}", self.worker_id, self.error);
        match self.kind {
            FailureKind::VersionMismatch => RoundError::connection(Some(self.chunk), peer, reason),
            FailureKind::Analysis => RoundError::AnalyzerFailure {
                chunk: self.chunk,
                reason,
            },
        }
    }
}

/// Serialize a message with its 4-byte length prefix
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    let msg_bytes = rmp_serde::to_vec(msg).map_err(|e| ProtocolError::Encode(e.to_string()))?;

    if msg_bytes.len() > MAX_MESSAGE_LEN {
        return Err(ProtocolError::TooLarge(msg_bytes.len()));
    }

    let msg_len = msg_bytes.len() as u32;
    let mut framed = Vec::with_capacity(4 + msg_bytes.len());
    framed.extend_from_slice(&msg_len.to_le_bytes());
    framed.extend_from_slice(&msg_bytes);

    Ok(framed)
}

/// Read one complete message
///
/// Blocks until the length prefix and the full body have arrived.
pub async fn read_message<R>(stream: &mut R) -> Result<Message, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    read_exact_or_closed(stream, &mut len_buf).await?;

    let msg_len = u32::from_le_bytes(len_buf) as usize;
    if msg_len > MAX_MESSAGE_LEN {
        return Err(ProtocolError::TooLarge(msg_len));
    }

    let mut msg_buf = vec![0u8; msg_len];
    read_exact_or_closed(stream, &mut msg_buf).await?;

    rmp_serde::from_slice(&msg_buf).map_err(|e| ProtocolError::Decode(e.to_string()))
}

async fn read_exact_or_closed<R>(stream: &mut R, buf: &mut [u8]) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
{
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(ProtocolError::Closed),
        Err(e) => Err(ProtocolError::Io(e)),
    }
}

/// Write one framed message and flush it
pub async fn write_message<W>(stream: &mut W, msg: &Message) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let framed = serialize_message(msg)?;
    stream.write_all(&framed).await?;
    stream.flush().await?;
    Ok(())
}
