// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Per-node workspace directory.
//!
//! Everything a node persists — PID files, lock files, logs, drive
//! backing files, the BMC configuration, the QMP socket — lives under one
//! directory named after the node.  The directory is created on first
//! `start` and deliberately never removed: backing files survive node
//! restarts.

use crate::{NodeError, NodeResult};
use config::node::NodeConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Root used when the configuration does not name one.
const DEFAULT_ROOT: &str = "/var/tmp/vchassis";

#[derive(Debug, Clone)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    /// Resolve the workspace path for a node; nothing is touched on disk.
    #[must_use]
    pub fn resolve(config: &NodeConfig) -> Workspace {
        let root = config
            .workspace_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT));
        Workspace {
            path: root.join(&config.name),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Create the directory tree if absent.
    pub fn ensure(&self) -> NodeResult<()> {
        if self.exists() {
            return Ok(());
        }
        debug!("creating workspace {}", self.path.display());
        std::fs::create_dir_all(&self.path).map_err(|source| NodeError::Workspace {
            path: self.path.clone(),
            source,
        })
    }
}
