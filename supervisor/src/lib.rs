// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Crash-safe process supervision.
//!
//! A [`Supervisor`] owns the lifecycle of one OS process identified by a
//! PID file in its workspace.  Nothing about the process is retained in
//! memory between CLI invocations: every operation re-derives the state
//! `Unknown → Starting → Running → Stopping → Stopped` from the PID file,
//! and every state-changing operation runs under the task's advisory lock
//! file — the sole mutual-exclusion primitive between concurrent
//! invocations racing on the same task.
//!
//! Lifecycle races are not errors: starting a running task and stopping a
//! stopped one both report idempotent success.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod lock;
pub mod pidfile;
pub mod spawn;

pub use lock::LifecycleLock;
pub use pidfile::PidFile;

use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long a freshly spawned helper may take to become observably alive.
pub const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Ceiling on waiting for an externally started (asynchronous) task to
/// become observable.  The source loop this models had no documented upper
/// bound; 60 s is the explicit one chosen here.
pub const ASYNC_READY_TIMEOUT: Duration = Duration::from_secs(60);

/// A spawned process must survive this long to count as started.
const STARTUP_SETTLE: Duration = Duration::from_secs(1);

/// Grace between SIGTERM and SIGKILL.
const TERM_GRACE: Duration = Duration::from_secs(3);

/// Pause between liveness polls; the lock is dropped for this long each
/// cycle so concurrent `status()` calls are not starved.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How much trailing log output is attached to a start failure.
const DIAGNOSTIC_TAIL: usize = 2048;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not lock {path}: {errno}")]
    Lock {
        path: PathBuf,
        errno: nix::errno::Errno,
    },
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("'{name}' exited during startup ({status}); last output:\n{diagnostics}")]
    ExitedEarly {
        name: String,
        status: String,
        diagnostics: String,
    },
    #[error("'{name}' did not become observable within {timeout:?}")]
    ReadyTimeout { name: String, timeout: Duration },
    #[error("signalling pid {pid} failed: {errno}")]
    Signal { pid: i32, errno: nix::errno::Errno },
}

/// Observed state of a supervised task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running { pid: i32 },
    Stopped,
}

/// Outcome of a `start()` call; both variants are successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { pid: i32 },
    AlreadyRunning { pid: i32 },
}

/// Outcome of a `stop()` call; both variants are successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped { pid: i32 },
    AlreadyStopped,
}

/// Lifecycle supervisor for one task's process.
#[derive(Debug, Clone)]
pub struct Supervisor {
    name: String,
    workspace: PathBuf,
    log_path: PathBuf,
    /// Observe-only: the process is started by an external controller and
    /// `start()` must never spawn it.
    asynchronous: bool,
    /// Network namespace to enter when spawning (`ip netns exec`).  The
    /// namespace must already exist.
    namespace: Option<String>,
}

impl Supervisor {
    #[must_use]
    pub fn new(name: impl Into<String>, workspace: impl Into<PathBuf>) -> Supervisor {
        let name = name.into();
        let workspace = workspace.into();
        let log_path = workspace.join(format!("{name}.log"));
        Supervisor {
            name,
            workspace,
            log_path,
            asynchronous: false,
            namespace: None,
        }
    }

    #[must_use]
    pub fn asynchronous(mut self, asynchronous: bool) -> Supervisor {
        self.asynchronous = asynchronous;
        self
    }

    #[must_use]
    pub fn namespace(mut self, namespace: Option<String>) -> Supervisor {
        self.namespace = namespace;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    fn pidfile(&self) -> PidFile {
        PidFile::for_task(&self.workspace, &self.name)
    }

    fn lock(&self) -> Result<LifecycleLock, ProcessError> {
        LifecycleLock::acquire(&self.workspace.join(format!(".{}.pid.lck", self.name)))
    }

    /// Start (or observe) the task's process.
    ///
    /// Idempotent: a live PID file short-circuits to
    /// [`StartOutcome::AlreadyRunning`].  The liveness check, stale-file
    /// cleanup, spawn and PID-file write all happen under one lock
    /// acquisition, so a concurrent `start()` racing this one observes the
    /// fresh process instead of spawning a second one.  The lock is dropped
    /// only between settle polls; a process that dies inside the settle
    /// window is reported as a start failure and its PID file removed.
    pub fn start(&self, program: &str, args: &[String]) -> Result<StartOutcome, ProcessError> {
        let spawned = {
            let _lock = self.lock()?;
            let pidfile = self.pidfile();
            if let Some(pid) = pidfile.live_pid() {
                info!("'{}' already running with pid {pid}", self.name);
                return Ok(StartOutcome::AlreadyRunning { pid: pid.as_raw() });
            }
            // A dead PID in the file is stale state from a previous run.
            pidfile.remove()?;
            if self.asynchronous {
                None
            } else {
                debug!("spawning '{}': {program} {}", self.name, args.join(" "));
                let child =
                    spawn::spawn_detached(program, args, &self.log_path, self.namespace.as_deref())?;
                pidfile.write(Pid::from_raw(i32::try_from(child.id()).unwrap_or(0)))?;
                Some(child)
            }
        };
        let Some(mut child) = spawned else {
            return self.observe_external();
        };
        let pid = Pid::from_raw(i32::try_from(child.id()).unwrap_or(0));

        // The child must survive the settle window; a bounded poll with the
        // lock dropped between cycles so status() is not starved.
        let deadline = Instant::now() + READY_TIMEOUT;
        let settled = Instant::now() + STARTUP_SETTLE;
        loop {
            {
                let _lock = self.lock()?;
                match child.try_wait() {
                    Ok(Some(status)) => {
                        self.remove_own_pidfile(pid)?;
                        let diagnostics = self.log_tail();
                        return Err(ProcessError::ExitedEarly {
                            name: self.name.clone(),
                            status: status.to_string(),
                            diagnostics,
                        });
                    }
                    Ok(None) => {
                        if Instant::now() >= settled {
                            info!("'{}' started with pid {pid}", self.name);
                            return Ok(StartOutcome::Started { pid: pid.as_raw() });
                        }
                    }
                    Err(source) => {
                        self.remove_own_pidfile(pid)?;
                        return Err(ProcessError::Spawn {
                            program: program.to_string(),
                            source,
                        });
                    }
                }
                if Instant::now() >= deadline {
                    self.remove_own_pidfile(pid)?;
                    return Err(ProcessError::ReadyTimeout {
                        name: self.name.clone(),
                        timeout: READY_TIMEOUT,
                    });
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Remove the PID file, but only while it still records `pid`: a
    /// concurrent `start()` may have replaced it with a newer process.
    fn remove_own_pidfile(&self, pid: Pid) -> Result<(), ProcessError> {
        let pidfile = self.pidfile();
        if pidfile.read()? == Some(pid) {
            pidfile.remove()?;
        }
        Ok(())
    }

    /// Wait for an externally controlled process to become observable: its
    /// controller writes the PID file, we poll it for a live PID.
    fn observe_external(&self) -> Result<StartOutcome, ProcessError> {
        let deadline = Instant::now() + ASYNC_READY_TIMEOUT;
        loop {
            {
                let _lock = self.lock()?;
                if let Some(pid) = self.pidfile().live_pid() {
                    info!("'{}' observed running with pid {pid}", self.name);
                    return Ok(StartOutcome::Started { pid: pid.as_raw() });
                }
            }
            if Instant::now() >= deadline {
                return Err(ProcessError::ReadyTimeout {
                    name: self.name.clone(),
                    timeout: ASYNC_READY_TIMEOUT,
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Terminate the task's process: SIGTERM, a short grace, then SIGKILL.
    ///
    /// Idempotent: an absent or dead PID reports
    /// [`StopOutcome::AlreadyStopped`].  The PID file is removed on every
    /// path, including the stale-file case.
    pub fn stop(&self) -> Result<StopOutcome, ProcessError> {
        if !self.workspace.exists() {
            return Ok(StopOutcome::AlreadyStopped);
        }
        let _lock = self.lock()?;
        let pidfile = self.pidfile();
        let Some(pid) = pidfile.live_pid() else {
            pidfile.remove()?;
            info!("'{}' already stopped", self.name);
            return Ok(StopOutcome::AlreadyStopped);
        };

        debug!("sending SIGTERM to '{}' (pid {pid})", self.name);
        spawn::send_signal(pid, nix::sys::signal::Signal::SIGTERM)?;
        let deadline = Instant::now() + TERM_GRACE;
        while spawn::alive(pid) && Instant::now() < deadline {
            std::thread::sleep(POLL_INTERVAL);
        }
        if spawn::alive(pid) {
            warn!("'{}' survived SIGTERM; killing pid {pid}", self.name);
            spawn::send_signal(pid, nix::sys::signal::Signal::SIGKILL)?;
        }
        pidfile.remove()?;
        info!("'{}' stopped", self.name);
        Ok(StopOutcome::Stopped { pid: pid.as_raw() })
    }

    /// Observe the task's state, cleaning up a stale PID file if found.
    pub fn status(&self) -> Result<TaskState, ProcessError> {
        if !self.workspace.exists() {
            // No workspace yet means the node has never been started.
            return Ok(TaskState::Stopped);
        }
        let _lock = self.lock()?;
        let pidfile = self.pidfile();
        match pidfile.read()? {
            Some(pid) if spawn::alive(pid) => Ok(TaskState::Running { pid: pid.as_raw() }),
            Some(pid) => {
                debug!("'{}' has stale PID file (pid {pid} is gone)", self.name);
                pidfile.remove()?;
                Ok(TaskState::Stopped)
            }
            None => Ok(TaskState::Stopped),
        }
    }

    /// Wait up to `timeout` for the process to disappear.  Used by callers
    /// that requested a cooperative shutdown through a control channel.
    #[must_use]
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.pidfile().live_pid() {
                None => return true,
                Some(_) if Instant::now() >= deadline => return false,
                Some(_) => std::thread::sleep(POLL_INTERVAL),
            }
        }
    }

    fn log_tail(&self) -> String {
        let Ok(contents) = std::fs::read(&self.log_path) else {
            return String::from("<no log output captured>");
        };
        let tail_start = contents.len().saturating_sub(DIAGNOSTIC_TAIL);
        String::from_utf8_lossy(&contents[tail_start..]).into_owned()
    }
}
