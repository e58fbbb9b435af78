//! JSON output formatting
//!
//! Serializes the round history for external reporting (charts, CSV
//! conversion and so on happen downstream of this file).

use crate::harness::{RoundHistory, RoundRecord, Strategy};
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        Self {
            micros: d.as_micros() as u64,
            human: crate::util::time::format_duration(d),
        }
    }
}

/// One history row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRound {
    pub strategy: Strategy,
    pub range_start: u64,
    pub range_end: u64,
    pub worker_count: usize,
    pub elapsed: JsonDuration,
    /// RFC 3339
    pub recorded_at: String,
}

impl From<&RoundRecord> for JsonRound {
    fn from(record: &RoundRecord) -> Self {
        Self {
            strategy: record.strategy,
            range_start: record.range.start(),
            range_end: record.range.end(),
            worker_count: record.worker_count,
            elapsed: JsonDuration::from_duration(record.elapsed),
            recorded_at: record.recorded_at.to_rfc3339(),
        }
    }
}

/// Top-level history document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonHistoryOutput {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub generated_at: String,
    pub rounds: Vec<JsonRound>,
}

/// Build the history document
pub fn build_history_output(history: &RoundHistory) -> JsonHistoryOutput {
    JsonHistoryOutput {
        version: env!("CARGO_PKG_VERSION").to_string(),
        hostname: hostname::get().ok().and_then(|h| h.into_string().ok()),
        generated_at: chrono::Utc::now().to_rfc3339(),
        rounds: history.records().iter().map(JsonRound::from).collect(),
    }
}

/// Write JSON output to file, creating the parent directory if needed
pub fn write_json_output(output_path: &Path, output: &JsonHistoryOutput, pretty: bool) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;

    if pretty {
        serde_json::to_writer_pretty(file, output)?;
    } else {
        serde_json::to_writer(file, output)?;
    }

    Ok(())
}
