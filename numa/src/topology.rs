// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Read-only snapshot of the host CPU layout.

use crate::NumaError;

/// One logical CPU (hardware thread) and its position in the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuThread {
    /// Hardware thread id; what the scheduler pins against.
    pub id: u32,
    /// Physical package id.
    pub socket: u32,
    /// Core id within the socket.
    pub core: u32,
}

/// The host's logical CPUs, in hardware-thread id order.
///
/// The snapshot is taken once per run; acquisition cost and cache coherency
/// are not a concern for consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuTopology {
    threads: Vec<CpuThread>,
}

impl CpuTopology {
    /// Build a snapshot from an explicit thread list.  Used by tests and by
    /// callers that obtain the layout from somewhere other than procfs.
    #[must_use]
    pub fn from_threads(mut threads: Vec<CpuThread>) -> CpuTopology {
        threads.sort_by_key(|t| t.id);
        CpuTopology { threads }
    }

    /// Snapshot the running host via `/proc/cpuinfo`.
    #[cfg(target_os = "linux")]
    pub fn current() -> Result<CpuTopology, NumaError> {
        use procfs::Current;
        let info = procfs::CpuInfo::current()
            .map_err(|e| NumaError::TopologyUnreadable(e.to_string()))?;
        let mut threads = Vec::with_capacity(info.num_cores());
        for cpu in 0..info.num_cores() {
            let id = parse_field(&info, cpu, "processor")?;
            // Single-socket machines may omit the topology fields entirely.
            let socket = parse_field(&info, cpu, "physical id").unwrap_or(0);
            let core = parse_field(&info, cpu, "core id").unwrap_or(id);
            threads.push(CpuThread { id, socket, core });
        }
        if threads.is_empty() {
            return Err(NumaError::TopologyUnreadable(
                "no processors listed in /proc/cpuinfo".to_string(),
            ));
        }
        Ok(CpuTopology::from_threads(threads))
    }

    /// All threads, ascending by id.
    #[must_use]
    pub fn threads(&self) -> &[CpuThread] {
        &self.threads
    }

    /// The largest thread count found on any single physical core.
    #[must_use]
    pub fn hyperthread_factor(&self) -> usize {
        let mut counts = std::collections::BTreeMap::new();
        for thread in &self.threads {
            *counts.entry((thread.socket, thread.core)).or_insert(0usize) += 1;
        }
        counts.values().copied().max().unwrap_or(1)
    }
}

#[cfg(target_os = "linux")]
fn parse_field(info: &procfs::CpuInfo, cpu: usize, field: &str) -> Result<u32, NumaError> {
    info.get_field(cpu, field)
        .ok_or_else(|| NumaError::TopologyUnreadable(format!("cpu {cpu} has no '{field}' field")))?
        .trim()
        .parse()
        .map_err(|_| NumaError::TopologyUnreadable(format!("cpu {cpu}: '{field}' is not numeric")))
}
