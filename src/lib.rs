//! amipulse - perfect numbers and amicable pairs, three ways
//!
//! amipulse enumerates perfect numbers and amicable pairs over a numeric range
//! and measures how the search scales across execution strategies.
//!
//! # Architecture
//!
//! - **Partitioning**: a range split into one contiguous chunk per worker
//! - **Analysis**: divisor sums behind the [`analyzer::ChunkAnalyzer`] trait
//! - **Strategies**: sequential, local threads, networked workers over TCP
//! - **Aggregation**: per-chunk findings merged into one deduplicated answer
//! - **Harness**: timed rounds recorded in a caller-owned history
//!
//! # Example
//!
//! ```
//! use amipulse::partition::Range;
//! use amipulse::worker::{run_local, run_sequential};
//!
//! let range = Range::new(1, 1_300).unwrap();
//! let local = run_local(range, 4).unwrap();
//! let sequential = run_sequential(range).unwrap();
//!
//! assert!(local.same_findings(&sequential));
//! assert_eq!(local.amicable_pairs(), &[(220, 284), (1184, 1210)]);
//! ```

pub mod analyzer;
pub mod config;
pub mod distributed;
pub mod error;
pub mod harness;
pub mod output;
pub mod partition;
pub mod results;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use error::RoundError;
pub use partition::{partition, Range, WorkItem};
pub use results::{AggregateResult, PartialResult};

/// Result type used at the application edges
pub type Result<T> = anyhow::Result<T>;
