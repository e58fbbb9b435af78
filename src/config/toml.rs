//! TOML configuration file parsing

use super::*;
use crate::config::cli::{Cli, Command};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Load the config file named on the command line (or defaults) and apply CLI overrides
pub fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => parse_toml_file(path)?,
        None => Config::default(),
    };
    merge_cli_with_config(cli, config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    if let Some(path) = &cli.json_output {
        config.output.json_output = Some(path.clone());
    }
    if cli.verbose {
        config.output.verbose = true;
    }

    match &cli.command {
        Command::Sequential { ranges } => {
            override_ranges(&mut config, &ranges.ranges);
        }
        Command::Local { ranges, workers, timeout } => {
            override_ranges(&mut config, &ranges.ranges);
            if let Some(workers) = workers {
                config.run.workers = *workers;
            }
            if timeout.is_some() {
                config.run.local_timeout_secs = *timeout;
            }
        }
        Command::Coordinator {
            ranges,
            workers,
            bind,
            accept_timeout,
            collect_timeout,
            reassign_locally,
        } => {
            override_ranges(&mut config, &ranges.ranges);
            if let Some(workers) = workers {
                config.run.workers = *workers;
            }
            if let Some(bind) = bind {
                config.network.bind = bind.clone();
            }
            if accept_timeout.is_some() {
                config.network.accept_timeout_secs = *accept_timeout;
            }
            if collect_timeout.is_some() {
                config.network.collect_timeout_secs = *collect_timeout;
            }
            if *reassign_locally {
                config.network.reassign_locally = true;
            }
        }
        Command::Worker { connect, connect_retry, .. } => {
            if let Some(addr) = connect {
                config.network.bind = addr.clone();
            }
            if let Some(secs) = connect_retry {
                config.network.connect_retry_secs = *secs;
            }
        }
        Command::Bench { ranges, workers, strategies } => {
            override_ranges(&mut config, &ranges.ranges);
            if let Some(workers) = workers {
                config.run.workers = *workers;
            }
            if !strategies.is_empty() {
                config.run.strategies = strategies.clone();
            }
        }
        Command::Inspect { .. } => {}
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    Ok(config)
}

fn override_ranges(config: &mut Config, ranges: &[RangeSpec]) {
    if !ranges.is_empty() {
        config.run.ranges = ranges.to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_toml_basic() {
        let toml_str = r#"
            [network]
            bind = "0.0.0.0:4000"
            collect_timeout_secs = 30

            [run]
            workers = 4
            ranges = [{ start = 1, end = 10000 }]
        "#;

        let config = parse_toml_string(toml_str).unwrap();
        assert_eq!(config.network.bind, "0.0.0.0:4000");
        assert_eq!(config.network.collect_timeout(), Some(std::time::Duration::from_secs(30)));
        assert!(config.network.accept_timeout().is_none());
        assert_eq!(config.run.workers, 4);
        assert_eq!(config.run.ranges, vec![RangeSpec { start: 1, end: 10_000 }]);
        // Unset sections fall back to defaults
        assert!(config.output.json_output.is_none());
        assert_eq!(config.run.strategies, vec![Strategy::Sequential, Strategy::Local]);
    }

    #[test]
    fn test_parse_toml_empty_uses_defaults() {
        let config = parse_toml_string("").unwrap();
        assert_eq!(config.network.bind, "127.0.0.1:12345");
        assert_eq!(config.run.ranges.len(), 3);
    }

    #[test]
    fn test_parse_toml_strategies() {
        let config = parse_toml_string("[run]\nstrategies = [\"local\", \"network\"]\n").unwrap();
        assert_eq!(config.run.strategies, vec![Strategy::Local, Strategy::Network]);
    }

    #[test]
    fn test_parse_toml_rejects_bad_types() {
        assert!(parse_toml_string("[run]\nworkers = \"many\"\n").is_err());
    }

    #[test]
    fn test_parse_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[run]\nworkers = 3\n[output]\nverbose = true").unwrap();

        let config = parse_toml_file(file.path()).unwrap();
        assert_eq!(config.run.workers, 3);
        assert!(config.output.verbose);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = parse_toml_file(Path::new("/nonexistent/amipulse.toml")).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/amipulse.toml"));
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[network]\nbind = \"127.0.0.1:7000\"\ncollect_timeout_secs = 5\n[run]\nworkers = 8"
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::try_parse_from([
            "amipulse",
            "coordinator",
            "--config",
            &path,
            "-w",
            "2",
            "-r",
            "1-300",
            "--reassign-locally",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();

        assert_eq!(config.run.workers, 2);
        assert_eq!(config.run.ranges, vec![RangeSpec { start: 1, end: 300 }]);
        assert_eq!(config.network.bind, "127.0.0.1:7000");
        assert_eq!(config.network.collect_timeout_secs, Some(5));
        assert!(config.network.reassign_locally);
    }

    #[test]
    fn test_worker_connect_overrides_bind() {
        let cli = Cli::try_parse_from(["amipulse", "worker", "--connect", "10.0.0.5:12345"]).unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.network.bind, "10.0.0.5:12345");
    }

    #[test]
    fn test_merge_rejects_invalid_result() {
        let cli = Cli::try_parse_from(["amipulse", "sequential", "-r", "10-5"]).unwrap();
        assert!(load_config(&cli).is_err());
    }
}
