// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Host CPU topology snapshot and NUMA-aware hardware-thread allocation.
//!
//! [`CpuTopology`] is a read-only snapshot of the host's logical CPUs
//! grouped by (socket, physical core).  [`NumaBinder`] consumes such a
//! snapshot once per run and hands out hardware-thread sets for CPU
//! pinning, always from a single socket, preferring whole physical cores.
//!
//! There is deliberately no process-wide singleton here: callers construct
//! one binder per run and pass it by reference to whatever needs pinning.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod binder;
pub mod topology;

pub use binder::NumaBinder;
pub use topology::{CpuThread, CpuTopology};

/// Errors raised while reading the host topology or allocating threads.
#[derive(Debug, thiserror::Error)]
pub enum NumaError {
    #[error("host CPU topology unreadable: {0}")]
    TopologyUnreadable(String),
    #[error("no socket can supply {requested} hardware threads ({best_available} available on the fullest socket)")]
    InsufficientThreads {
        requested: usize,
        best_available: usize,
    },
}
