// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Hardware topology compiler.
//!
//! Turns the declarative compute description into the exact invocation for
//! the hypervisor process: CPU/memory/network fragments, storage
//! controllers with bus/address assignment, depth-first PCI bridge
//! numbering, the BMC-facing management interface, and the monitor/serial
//! control channels.
//!
//! Every element follows the same small contract ([`Element`]): validate
//! first, then render into a [`CmdLine`].  Rendering is deterministic and
//! idempotent once validation passed — re-rendering an element never
//! duplicates options.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod cmdline;
pub mod control;
pub mod cpu;
pub mod memory;
pub mod mgmt;
pub mod network;
pub mod pci;
pub mod storage;

pub use cmdline::CmdLine;
pub use pci::PciTopology;
pub use storage::StorageTopology;

use std::path::PathBuf;

/// Errors raised while resolving or rendering topology elements.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("invalid element: {0}")]
    Invalid(String),
    #[error("backing file {path}: {source}")]
    BackingFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("qemu-img failed for {path}: {detail}")]
    ImageTool { path: PathBuf, detail: String },
    #[error("storage controller #{index} wants a PCI bridge bus but none are left")]
    NoAttachableBus { index: usize },
}

/// Alias for results of topology resolution and rendering.
pub type TopologyResult<T> = Result<T, TopologyError>;

/// One composable fragment of a task's command line.
///
/// Invariant: once `validate()` passes, `render()` is deterministic and
/// idempotent; re-adding an identical option through [`CmdLine`] is a
/// warn-and-skip no-op, never a duplicate.
pub trait Element {
    fn validate(&self) -> TopologyResult<()>;
    fn render(&self, cmd: &mut CmdLine) -> TopologyResult<()>;
}
