//! Networked execution
//!
//! Rounds distributed across worker processes over TCP.
//!
//! # Architecture
//!
//! - **Coordinator**: binds, accepts exactly one connection per chunk,
//!   assigns chunks and aggregates the replies
//! - **Agent**: connects to the coordinator, analyzes its chunk and replies
//!
//! # Modules
//!
//! - `protocol`: message definitions and framing
//! - `coordinator`: round orchestration on the listening side
//! - `agent`: worker side of the exchange

pub mod agent;
pub mod coordinator;
pub mod protocol;

pub use agent::{Agent, ServedChunk};
pub use coordinator::Coordinator;
pub use protocol::{
    AssignMessage,
    ErrorMessage,
    FailureKind,
    Message,
    ProtocolError,
    ResultMessage,
    PROTOCOL_VERSION,
};
