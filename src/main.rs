//! amipulse CLI entry point

use amipulse::analyzer::{euclid_perfect_numbers, inspect, DivisorSumAnalyzer};
use amipulse::config::cli::{Cli, Command};
use amipulse::config::{toml::load_config, Config};
use amipulse::distributed::{Agent, Coordinator};
use amipulse::harness::{timed, BenchSession, RoundHistory, Strategy};
use amipulse::output::{json, text};
use amipulse::worker::{run_sequential, LocalOrchestrator};
use anyhow::{Context, Result};

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.debug);
    cli.validate()?;

    let config = load_config(&cli)?;
    tracing::debug!("configuration:\n{}", config);

    let mut history = RoundHistory::new();

    match &cli.command {
        Command::Sequential { .. } => run_sequential_rounds(&config, &mut history)?,
        Command::Local { .. } => run_local_rounds(&config, &mut history)?,
        Command::Coordinator { .. } => run_coordinator(&config, &mut history)?,
        Command::Worker { rounds, forever, .. } => {
            let max_rounds = if *forever { None } else { Some(*rounds) };
            return run_worker(&config, max_rounds);
        }
        Command::Bench { .. } => run_bench(&config, &mut history)?,
        Command::Inspect { numbers, euclid } => return run_inspect(numbers, *euclid),
    }

    text::print_history(&history);

    if let Some(ref path) = config.output.json_output {
        json::write_json_output(path, &json::build_history_output(&history), true)
            .with_context(|| format!("Failed to write history to {}", path.display()))?;
        println!("History written to: {}", path.display());
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise warn, or debug with `--debug`
fn init_logging(debug: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            tracing_subscriber::EnvFilter::new("debug")
        } else {
            tracing_subscriber::EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_sequential_rounds(config: &Config, history: &mut RoundHistory) -> Result<()> {
    for range in config.run.ranges()? {
        let result = timed(history, Strategy::Sequential, range, 1, |range, _| run_sequential(range))
            .with_context(|| format!("Sequential round {} failed", range))?;
        text::print_round(Strategy::Sequential, range, &result, config.output.verbose);
    }
    Ok(())
}

fn run_local_rounds(config: &Config, history: &mut RoundHistory) -> Result<()> {
    let orchestrator = LocalOrchestrator::new(DivisorSumAnalyzer).with_timeout(config.run.local_timeout());

    for range in config.run.ranges()? {
        let result = timed(history, Strategy::Local, range, config.run.workers, |range, workers| {
            orchestrator.run(range, workers)
        })
        .with_context(|| format!("Local round {} failed", range))?;
        text::print_round(Strategy::Local, range, &result, config.output.verbose);
    }
    Ok(())
}

fn run_coordinator(config: &Config, history: &mut RoundHistory) -> Result<()> {
    let ranges = config.run.ranges()?;
    let workers = config.run.workers;
    let mut coordinator = Coordinator::new(config.network.clone());

    println!("Coordinator listening on {}", coordinator.config().bind);
    if coordinator.config().reassign_locally {
        println!("Chunks of failed connections are reanalyzed locally");
    }
    println!("Waiting for {} worker(s) per round, {} round(s)", workers, ranges.len());
    println!();

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let results = runtime
        .block_on(coordinator.run_rounds(&ranges, workers, history))
        .context("Network round failed")?;

    for (range, result) in ranges.iter().zip(&results) {
        text::print_round(Strategy::Network, *range, result, config.output.verbose);
    }
    Ok(())
}

fn run_worker(config: &Config, max_rounds: Option<usize>) -> Result<()> {
    let agent = Agent::new(&config.network);
    println!("Worker {} connecting to {}", agent.worker_id(), config.network.bind);

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let served = runtime
        .block_on(agent.run(max_rounds))
        .context("Worker failed")?;

    println!("✅ Served {} assignment(s)", served);
    Ok(())
}

fn run_bench(config: &Config, history: &mut RoundHistory) -> Result<()> {
    let session = BenchSession::from_config(config)?;
    let report = session.run(history).context("Benchmark failed")?;
    text::print_comparison(&report);
    Ok(())
}

fn run_inspect(numbers: &[u64], euclid: Option<u64>) -> Result<()> {
    let reports = numbers
        .iter()
        .map(|&n| inspect(n).with_context(|| format!("Failed to inspect {}", n)))
        .collect::<Result<Vec<_>>>()?;
    text::print_inspect(&reports);

    if let Some(limit) = euclid {
        if !reports.is_empty() {
            println!();
        }
        text::print_euclid(limit, &euclid_perfect_numbers(limit));
    }
    Ok(())
}
