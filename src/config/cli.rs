//! CLI argument parsing using clap

use crate::config::RangeSpec;
use crate::harness::Strategy;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// amipulse - perfect number and amicable pair search, sequential, threaded or networked
#[derive(Parser, Debug)]
#[command(name = "amipulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file (CLI flags take precedence)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write round history as JSON to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub json_output: Option<PathBuf>,

    /// Print every finding instead of counts only
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze each range on the calling thread
    Sequential {
        #[command(flatten)]
        ranges: RangeArgs,
    },

    /// Analyze each range on local worker threads
    Local {
        #[command(flatten)]
        ranges: RangeArgs,

        /// Worker threads per round
        #[arg(short, long)]
        workers: Option<usize>,

        /// Fail a round whose threads have not all reported after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Listen for network workers and distribute each range across them
    Coordinator {
        #[command(flatten)]
        ranges: RangeArgs,

        /// Worker connections per round
        #[arg(short, long)]
        workers: Option<usize>,

        /// Address to bind (host:port)
        #[arg(long)]
        bind: Option<String>,

        /// Fail a round if workers have not all connected after this many seconds
        #[arg(long, value_name = "SECS")]
        accept_timeout: Option<u64>,

        /// Fail a round if a worker has not replied after this many seconds
        #[arg(long, value_name = "SECS")]
        collect_timeout: Option<u64>,

        /// Analyze a chunk locally when its worker connection fails
        #[arg(long)]
        reassign_locally: bool,
    },

    /// Connect to a coordinator and analyze assigned chunks
    Worker {
        /// Coordinator address (host:port)
        #[arg(long)]
        connect: Option<String>,

        /// Assignments to serve before exiting
        #[arg(long, default_value = "1", conflicts_with = "forever")]
        rounds: usize,

        /// Serve assignments until the coordinator goes away
        #[arg(long)]
        forever: bool,

        /// Keep retrying the initial connect for this many seconds
        #[arg(long, value_name = "SECS")]
        connect_retry: Option<u64>,
    },

    /// Run every range under several strategies and compare timings
    Bench {
        #[command(flatten)]
        ranges: RangeArgs,

        /// Worker count for the threaded and networked strategies
        #[arg(short, long)]
        workers: Option<usize>,

        /// Strategies to compare
        #[arg(long, value_enum, value_delimiter = ',')]
        strategies: Vec<Strategy>,
    },

    /// Report divisor sum and classification of individual numbers
    Inspect {
        /// Numbers to inspect
        numbers: Vec<u64>,

        /// Also list even perfect numbers up to this limit from Euclid's formula
        #[arg(long, value_name = "LIMIT")]
        euclid: Option<u64>,
    },
}

/// Ranges shared by the round-running subcommands
#[derive(Args, Debug, Default)]
pub struct RangeArgs {
    /// Range to analyze as START-END or END (repeatable)
    #[arg(short, long = "range", value_name = "START-END")]
    pub ranges: Vec<RangeSpec>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        match &self.command {
            Command::Local { workers: Some(0), .. }
            | Command::Coordinator { workers: Some(0), .. }
            | Command::Bench { workers: Some(0), .. } => {
                anyhow::bail!("workers must be at least 1");
            }
            Command::Worker { rounds: 0, forever: false, .. } => {
                anyhow::bail!("rounds must be at least 1");
            }
            Command::Inspect { numbers, euclid } => {
                if numbers.is_empty() && euclid.is_none() {
                    anyhow::bail!("inspect needs at least one number or --euclid");
                }
                if numbers.contains(&0) {
                    anyhow::bail!("numbers must be at least 1");
                }
            }
            _ => {}
        }
        Ok(())
    }
}
