//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod toml;

use crate::error::RoundError;
use crate::harness::Strategy;
use crate::partition::Range;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Coordinator/worker networking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address the coordinator binds and workers connect to (host:port)
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Give up waiting for workers after this many seconds (unset waits forever)
    #[serde(default)]
    pub accept_timeout_secs: Option<u64>,
    /// Give up waiting for a worker reply after this many seconds
    #[serde(default)]
    pub collect_timeout_secs: Option<u64>,
    /// Analyze a chunk locally when its worker connection fails
    #[serde(default)]
    pub reassign_locally: bool,
    /// How long a worker keeps retrying its initial connect
    #[serde(default = "default_connect_retry_secs")]
    pub connect_retry_secs: u64,
}

fn default_bind() -> String {
    "127.0.0.1:12345".to_string()
}

fn default_connect_retry_secs() -> u64 {
    10
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            accept_timeout_secs: None,
            collect_timeout_secs: None,
            reassign_locally: false,
            connect_retry_secs: default_connect_retry_secs(),
        }
    }
}

impl NetworkConfig {
    pub fn accept_timeout(&self) -> Option<Duration> {
        self.accept_timeout_secs.map(Duration::from_secs)
    }

    pub fn collect_timeout(&self) -> Option<Duration> {
        self.collect_timeout_secs.map(Duration::from_secs)
    }

    pub fn connect_retry(&self) -> Duration {
        Duration::from_secs(self.connect_retry_secs)
    }
}

/// Rounds to run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Worker count per round (threads or connections)
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Ranges analyzed, one round each
    #[serde(default = "default_ranges")]
    pub ranges: Vec<RangeSpec>,
    /// Strategies compared by `bench`
    #[serde(default = "default_strategies")]
    pub strategies: Vec<Strategy>,
    /// Bound on the local join barrier (unset waits for every thread)
    #[serde(default)]
    pub local_timeout_secs: Option<u64>,
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_ranges() -> Vec<RangeSpec> {
    vec![
        RangeSpec { start: 1, end: 100_000 },
        RangeSpec { start: 1, end: 500_000 },
        RangeSpec { start: 1, end: 1_000_000 },
    ]
}

fn default_strategies() -> Vec<Strategy> {
    vec![Strategy::Sequential, Strategy::Local]
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            ranges: default_ranges(),
            strategies: default_strategies(),
            local_timeout_secs: None,
        }
    }
}

impl RunConfig {
    /// Validated ranges
    pub fn ranges(&self) -> Result<Vec<Range>, RoundError> {
        self.ranges.iter().map(RangeSpec::to_range).collect()
    }

    pub fn local_timeout(&self) -> Option<Duration> {
        self.local_timeout_secs.map(Duration::from_secs)
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Write round history as JSON to this path
    #[serde(default)]
    pub json_output: Option<PathBuf>,
    /// Print every finding instead of counts only
    #[serde(default)]
    pub verbose: bool,
}

/// Inclusive range as written in config files and on the command line
///
/// Unlike [`Range`] this is unchecked; [`RangeSpec::to_range`] validates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSpec {
    pub start: u64,
    pub end: u64,
}

impl RangeSpec {
    pub fn to_range(&self) -> Result<Range, RoundError> {
        Range::new(self.start, self.end)
    }
}

impl FromStr for RangeSpec {
    type Err = String;

    /// Accepts `START-END` or a bare `END` (meaning `1-END`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (start, end) = match s.split_once('-') {
            Some((start, end)) => (start.trim(), end.trim()),
            None => ("1", s),
        };
        let start = parse_bound(start)?;
        let end = parse_bound(end)?;
        Ok(RangeSpec { start, end })
    }
}

/// Integer with optional `_` separators or a `k`/`m` suffix
fn parse_bound(s: &str) -> Result<u64, String> {
    let cleaned = s.replace('_', "").to_lowercase();
    let (digits, multiplier) = if let Some(d) = cleaned.strip_suffix('k') {
        (d, 1_000)
    } else if let Some(d) = cleaned.strip_suffix('m') {
        (d, 1_000_000)
    } else {
        (cleaned.as_str(), 1)
    };
    let value: u64 = digits.parse().map_err(|_| format!("Invalid range bound: {}", s))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("Range bound too large: {}", s))
}

// Display trait implementations

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Network: {}", self.network)?;
        writeln!(f, "Run: {}", self.run)?;
        write!(f, "Output: {}", self.output)
    }
}

impl fmt::Display for NetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bind={}", self.bind)?;
        if let Some(secs) = self.accept_timeout_secs {
            write!(f, ", accept_timeout={}s", secs)?;
        }
        if let Some(secs) = self.collect_timeout_secs {
            write!(f, ", collect_timeout={}s", secs)?;
        }
        if self.reassign_locally {
            write!(f, ", reassign_locally")?;
        }
        Ok(())
    }
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ranges: Vec<String> = self.ranges.iter().map(|r| r.to_string()).collect();
        let strategies: Vec<String> = self.strategies.iter().map(|s| s.to_string()).collect();
        write!(
            f,
            "workers={}, ranges=[{}], strategies=[{}]",
            self.workers,
            ranges.join(", "),
            strategies.join(", ")
        )
    }
}

impl fmt::Display for OutputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.json_output {
            Some(path) => write!(f, "json={}", path.display())?,
            None => write!(f, "text only")?,
        }
        if self.verbose {
            write!(f, ", verbose")?;
        }
        Ok(())
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

// Validation

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.network.validate()?;
        self.run.validate()?;
        Ok(())
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<(), String> {
        let (host, port) = self
            .bind
            .rsplit_once(':')
            .ok_or_else(|| format!("bind must be host:port, got {}", self.bind))?;
        if host.is_empty() {
            return Err(format!("bind is missing a host: {}", self.bind));
        }
        port.parse::<u16>()
            .map_err(|_| format!("bind has an invalid port: {}", self.bind))?;

        if self.accept_timeout_secs == Some(0) {
            return Err("accept_timeout_secs must be greater than 0".to_string());
        }
        if self.collect_timeout_secs == Some(0) {
            return Err("collect_timeout_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be greater than 0".to_string());
        }
        if self.ranges.is_empty() {
            return Err("At least one range must be specified".to_string());
        }
        for (i, spec) in self.ranges.iter().enumerate() {
            spec.to_range().map_err(|e| format!("Range {}: {}", i, e))?;
        }
        if self.strategies.is_empty() {
            return Err("At least one strategy must be specified".to_string());
        }
        if self.local_timeout_secs == Some(0) {
            return Err("local_timeout_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}
