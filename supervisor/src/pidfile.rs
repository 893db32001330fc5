// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Task PID files.
//!
//! One task ⇔ one PID file `.{task_name}.pid` in the task workspace: plain
//! text, a single integer, nothing else.  Together with the lock file it
//! is the only persisted lifecycle state.

use crate::{spawn, ProcessError};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    #[must_use]
    pub fn for_task(workspace: &Path, task_name: &str) -> PidFile {
        PidFile {
            path: workspace.join(format!(".{task_name}.pid")),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the recorded PID.  An unparseable file is treated as stale and
    /// reported as absent.
    pub fn read(&self) -> Result<Option<Pid>, ProcessError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ProcessError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        match raw.trim().parse::<i32>() {
            Ok(pid) => Ok(Some(Pid::from_raw(pid))),
            Err(_) => {
                warn!("{} holds garbage; treating as stale", self.path.display());
                Ok(None)
            }
        }
    }

    /// The recorded PID, but only if that process is alive right now.
    #[must_use]
    pub fn live_pid(&self) -> Option<Pid> {
        self.read().ok().flatten().filter(|pid| spawn::alive(*pid))
    }

    pub fn write(&self, pid: Pid) -> Result<(), ProcessError> {
        std::fs::write(&self.path, format!("{pid}\n")).map_err(|source| ProcessError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Remove the file; missing is fine.
    pub fn remove(&self) -> Result<(), ProcessError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ProcessError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
