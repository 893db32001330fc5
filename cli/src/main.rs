// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! The vchassis command line.
//!
//! Reconstructs the node from its YAML description on every invocation
//! and drives one lifecycle operation against it.  Nothing survives in
//! memory between invocations; the workspace on disk is the only state.

use clap::{Parser, Subcommand};
use config::node::NodeConfig;
use node::{Node, TaskState};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Debug, Parser)]
#[command(name = "vchassis", about = "virtual server chassis lifecycle driver")]
struct Cli {
    /// Path to the node description.
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,
    /// Increase log verbosity (repeatable).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start every task of the node.
    Start,
    /// Stop every task of the node.
    Stop,
    /// Stop, then start the node.
    Restart,
    /// Show the observed state of every task.
    Status,
    /// Verify the environment without starting anything.
    Precheck,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("cannot read {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        source: serde_yaml_ng::Error,
    },
    #[error(transparent)]
    Node(#[from] node::NodeError),
}

fn describe(state: TaskState) -> String {
    match state {
        TaskState::Running { pid } => format!("running (pid {pid})"),
        TaskState::Stopped => "stopped".to_string(),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load(path: &std::path::Path) -> Result<NodeConfig, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml_ng::from_str(&raw).map_err(|source| CliError::ParseConfig {
        path: path.to_path_buf(),
        source,
    })
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let node = Node::init(load(&cli.config)?)?;
    match cli.command {
        Command::Start => node.start()?,
        Command::Stop => node.stop()?,
        Command::Restart => {
            node.stop()?;
            node.start()?;
        }
        Command::Status => {
            for (name, state) in node.status()? {
                println!("{name:<16} {}", describe(state));
            }
        }
        Command::Precheck => {
            node.precheck()?;
            println!("{}: environment ok", node.name());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn task_states_render_for_humans() {
        assert_eq!(describe(TaskState::Running { pid: 4242 }), "running (pid 4242)");
        assert_eq!(describe(TaskState::Stopped), "stopped");
    }

    #[test]
    fn load_parses_a_node_description() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("n0.yaml");
        std::fs::write(
            &path,
            "name: n0\ncompute:\n  cpu:\n    count: 2\n  memory:\n    size_mib: 1024\n",
        )
        .unwrap();
        let config = load(&path).unwrap();
        assert_eq!(config.name, "n0");
        assert_eq!(config.compute.unwrap().memory.size_mib, 1024);
    }

    #[test]
    fn load_distinguishes_missing_from_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(missing, CliError::ReadConfig { .. }));

        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "name: [unclosed\n").unwrap();
        let malformed = load(&path).unwrap_err();
        assert!(matches!(malformed, CliError::ParseConfig { .. }));
    }
}
