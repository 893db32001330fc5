// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! The task contract.
//!
//! A task is one supervised process of a node.  Implementations provide
//! the fully resolved command line and any task-specific prechecks; the
//! lifecycle itself — start, terminate, status — is shared and delegates
//! to the task's [`Supervisor`].  Lifecycle calls are idempotent because
//! the supervisor's are.

use crate::{NodeError, NodeResult};
use supervisor::{Supervisor, TaskState};
use topology::CmdLine;
use tracing::debug;

pub trait Task: std::fmt::Debug {
    fn name(&self) -> &str;

    /// Start ordering; lower starts earlier, stops later.
    fn priority(&self) -> u8;

    fn supervisor(&self) -> &Supervisor;

    /// The resolved invocation for this task's process.
    fn command(&self) -> NodeResult<CmdLine>;

    /// Environment checks that must hold before `run()` can succeed.
    fn precheck(&self) -> NodeResult<()> {
        Ok(())
    }

    fn run(&self) -> NodeResult<()> {
        let command = self.command()?;
        debug!("task '{}' command: {}", self.name(), command.render());
        self.supervisor()
            .start(command.program(), &command.args())?;
        Ok(())
    }

    fn terminate(&self) -> NodeResult<()> {
        self.supervisor().stop()?;
        Ok(())
    }

    fn status(&self) -> NodeResult<TaskState> {
        Ok(self.supervisor().status()?)
    }
}

/// Resolve `program` through `PATH`, failing with a task-attributable
/// error when it is not installed.
pub fn require_executable(program: &str) -> NodeResult<()> {
    which::which(program)
        .map(|_| ())
        .map_err(|_| NodeError::MissingExecutable(program.to_string()))
}
