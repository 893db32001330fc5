// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Detached process launch and signalling.
//!
//! Supervised processes run in their own session (`setsid` before exec) so
//! they survive the launching CLI invocation exiting.  There is no
//! signal-handler state machine: liveness is re-derived by probing the PID
//! whenever someone asks.

use crate::ProcessError;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// Spawn `program` detached from the current session, stdout/stderr
/// appended to `log_path`.  With a namespace the invocation is wrapped in
/// `ip netns exec {ns}`; the namespace is entered, never created.
pub fn spawn_detached(
    program: &str,
    args: &[String],
    log_path: &Path,
    namespace: Option<&str>,
) -> Result<Child, ProcessError> {
    let log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|source| ProcessError::Io {
            path: log_path.to_path_buf(),
            source,
        })?;
    let log_err = log.try_clone().map_err(|source| ProcessError::Io {
        path: log_path.to_path_buf(),
        source,
    })?;

    let mut command = match namespace {
        Some(ns) => {
            let mut command = Command::new("ip");
            command.args(["netns", "exec", ns, program]);
            command
        }
        None => Command::new(program),
    };
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err));
    // New session: the child must not die with our controlling terminal.
    unsafe {
        command.pre_exec(|| {
            nix::unistd::setsid().map_err(std::io::Error::from)?;
            Ok(())
        });
    }
    command.spawn().map_err(|source| ProcessError::Spawn {
        program: program.to_string(),
        source,
    })
}

/// Probe whether `pid` is alive (signal 0).  EPERM means alive but owned
/// by someone else.
#[must_use]
pub fn alive(pid: Pid) -> bool {
    match kill(pid, None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

pub fn send_signal(pid: Pid, signal: Signal) -> Result<(), ProcessError> {
    match kill(pid, signal) {
        Ok(()) => Ok(()),
        // The process vanished between the liveness check and the signal.
        Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(ProcessError::Signal {
            pid: pid.as_raw(),
            errno,
        }),
    }
}
