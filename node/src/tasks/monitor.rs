// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Monitor task.
//!
//! An optional HTTP sidecar exposing the node's task states and logs.
//! Present only when the configuration carries a monitor section.

use crate::task::{require_executable, Task};
use crate::NodeResult;
use std::path::{Path, PathBuf};
use supervisor::Supervisor;
use topology::CmdLine;

const MONITOR: &str = "vchassis-monitor";

#[derive(Debug)]
pub struct MonitorTask {
    node_name: String,
    workspace: PathBuf,
    port: u16,
    supervisor: Supervisor,
}

impl MonitorTask {
    #[must_use]
    pub fn new(node_name: &str, workspace: &Path, port: u16, namespace: Option<String>) -> MonitorTask {
        MonitorTask {
            node_name: node_name.to_string(),
            workspace: workspace.to_path_buf(),
            port,
            supervisor: Supervisor::new("monitor", workspace).namespace(namespace),
        }
    }
}

impl Task for MonitorTask {
    fn name(&self) -> &str {
        "monitor"
    }

    fn priority(&self) -> u8 {
        super::PRIORITY_MONITOR
    }

    fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    fn precheck(&self) -> NodeResult<()> {
        require_executable(MONITOR)
    }

    fn command(&self) -> NodeResult<CmdLine> {
        let mut cmd = CmdLine::new(MONITOR);
        cmd.opt("--name", &self.node_name);
        cmd.opt("--workspace", self.workspace.display().to_string());
        cmd.opt("--port", self.port.to_string());
        Ok(cmd)
    }
}
