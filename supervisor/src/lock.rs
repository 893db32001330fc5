// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Advisory lock files.
//!
//! Every state-changing lifecycle operation runs under an exclusive flock
//! on `.{task_name}.pid.lck`.  The file carries no payload; only its lock
//! state matters.  Dropping the guard releases the lock, so every exit
//! path — including error paths — releases it.

use crate::ProcessError;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Exclusive guard over one task's lifecycle state.
#[derive(Debug)]
pub struct LifecycleLock {
    _flock: Flock<File>,
}

impl LifecycleLock {
    /// Acquire the lock, blocking until the holder releases it.
    pub fn acquire(path: &Path) -> Result<LifecycleLock, ProcessError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| ProcessError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let flock = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| {
            ProcessError::Lock {
                path: path.to_path_buf(),
                errno,
            }
        })?;
        Ok(LifecycleLock { _flock: flock })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reacquire_after_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".compute.pid.lck");
        let lock = LifecycleLock::acquire(&path).unwrap();
        drop(lock);
        LifecycleLock::acquire(&path).unwrap();
    }

    #[test]
    fn second_holder_blocks_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".compute.pid.lck");
        let lock = LifecycleLock::acquire(&path).unwrap();

        let contended = path.clone();
        let handle = std::thread::spawn(move || {
            let start = std::time::Instant::now();
            let _lock = LifecycleLock::acquire(&contended).unwrap();
            start.elapsed()
        });
        std::thread::sleep(std::time::Duration::from_millis(300));
        drop(lock);
        let waited = handle.join().unwrap();
        assert!(waited >= std::time::Duration::from_millis(200), "waited {waited:?}");
    }
}
