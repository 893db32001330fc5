// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Node orchestration.
//!
//! A [`Node`] is rebuilt from its configuration on every CLI invocation
//! and owns an ordered set of tasks: the serial bridge, the BMC
//! simulator, the hypervisor, the vendor management console and the
//! monitor.  Tasks start in ascending priority order and stop in
//! descending order, so the BMC is always listening before the
//! hypervisor's IPMI chardev connects and outlives it on the way down.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod node;
pub mod qmp;
pub mod task;
pub mod tasks;
pub mod workspace;

pub use node::Node;
pub use task::Task;
pub use workspace::Workspace;

// Callers inspect task states without depending on the supervisor crate.
pub use supervisor::TaskState;

use std::path::PathBuf;

/// Errors raised while building or operating a node.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Topology(#[from] topology::TopologyError),
    #[error(transparent)]
    Numa(#[from] numa::NumaError),
    #[error(transparent)]
    Process(#[from] supervisor::ProcessError),
    #[error("required executable '{0}' not found in PATH")]
    MissingExecutable(String),
    #[error("{address}:{port} is already bound by another process")]
    PortInUse { address: String, port: u16 },
    #[error("workspace {path}: {source}")]
    Workspace {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("control channel: {0}")]
    ControlChannel(String),
}

/// Alias for node orchestration results.
pub type NodeResult<T> = Result<T, NodeError>;
