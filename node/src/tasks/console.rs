// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Vendor management console task.
//!
//! Profiles that ship a vendor console (Dell, Quanta) run it as a helper
//! that daemonizes itself and records its own PID in the node workspace.
//! The task therefore launches the starter and then only observes: the
//! supervisor is asynchronous and never spawns the daemon itself.

use crate::task::{require_executable, Task};
use crate::NodeResult;
use std::path::Path;
use supervisor::{spawn, Supervisor, TaskState};
use topology::CmdLine;
use tracing::debug;

const CONSOLE: &str = "ipmi-console";

#[derive(Debug)]
pub struct ConsoleTask {
    node_name: String,
    namespace: Option<String>,
    supervisor: Supervisor,
}

impl ConsoleTask {
    #[must_use]
    pub fn new(node_name: &str, workspace: &Path, namespace: Option<String>) -> ConsoleTask {
        ConsoleTask {
            node_name: node_name.to_string(),
            namespace: namespace.clone(),
            supervisor: Supervisor::new(CONSOLE, workspace)
                .asynchronous(true)
                .namespace(namespace),
        }
    }
}

impl Task for ConsoleTask {
    fn name(&self) -> &str {
        CONSOLE
    }

    fn priority(&self) -> u8 {
        super::PRIORITY_CONSOLE
    }

    fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    fn precheck(&self) -> NodeResult<()> {
        require_executable(CONSOLE)
    }

    fn run(&self) -> NodeResult<()> {
        if matches!(self.supervisor.status()?, TaskState::Running { .. }) {
            return Ok(());
        }
        let command = self.command()?;
        debug!("task '{CONSOLE}' starter: {}", command.render());
        // The starter exits after daemonizing; the daemon writes the PID
        // file the asynchronous supervisor then observes.
        spawn::spawn_detached(
            command.program(),
            &command.args(),
            self.supervisor.log_path(),
            self.namespace.as_deref(),
        )?;
        self.supervisor.start(command.program(), &command.args())?;
        Ok(())
    }

    fn command(&self) -> NodeResult<CmdLine> {
        let mut cmd = CmdLine::new(CONSOLE);
        cmd.raw("start");
        cmd.raw(&self.node_name);
        Ok(cmd)
    }
}
