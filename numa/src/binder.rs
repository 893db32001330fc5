// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Socket- and hyperthread-aware hardware-thread allocator.

use crate::topology::CpuTopology;
use crate::NumaError;
use std::collections::BTreeMap;
use tracing::debug;

/// Number of leading physical cores per socket that are never offered.
/// They stay with the host OS and the supervisor itself.
const RESERVED_CORES_PER_SOCKET: usize = 2;

#[derive(Debug, Clone)]
struct ThreadSlot {
    id: u32,
    available: bool,
}

/// Allocator of hardware threads for CPU pinning.
///
/// Built once per run from a [`CpuTopology`] snapshot.  Allocation marks
/// threads consumed; there is no rollback — a failed downstream step does
/// not return threads to the pool within the same run.
#[derive(Debug, Clone)]
pub struct NumaBinder {
    /// (socket, core) -> thread slots, in thread-id order.
    cores: BTreeMap<(u32, u32), Vec<ThreadSlot>>,
    hyperthread_factor: usize,
}

impl NumaBinder {
    #[must_use]
    pub fn new(topology: &CpuTopology) -> NumaBinder {
        let hyperthread_factor = topology.hyperthread_factor();
        let mut cores: BTreeMap<(u32, u32), Vec<ThreadSlot>> = BTreeMap::new();
        for thread in topology.threads() {
            cores
                .entry((thread.socket, thread.core))
                .or_default()
                .push(ThreadSlot {
                    id: thread.id,
                    available: true,
                });
        }
        let mut binder = NumaBinder {
            cores,
            hyperthread_factor,
        };
        binder.reserve_leading_cores();
        binder
    }

    /// Mark the first [`RESERVED_CORES_PER_SOCKET`] cores of every socket
    /// permanently unavailable.
    fn reserve_leading_cores(&mut self) {
        let mut seen: BTreeMap<u32, usize> = BTreeMap::new();
        for ((socket, _core), slots) in &mut self.cores {
            let taken = seen.entry(*socket).or_insert(0);
            if *taken < RESERVED_CORES_PER_SOCKET {
                for slot in slots {
                    slot.available = false;
                }
                *taken += 1;
            }
        }
    }

    #[must_use]
    pub fn hyperthread_factor(&self) -> usize {
        self.hyperthread_factor
    }

    fn available_on_socket(&self, socket: u32) -> usize {
        self.cores
            .iter()
            .filter(|((s, _), _)| *s == socket)
            .flat_map(|(_, slots)| slots.iter())
            .filter(|slot| slot.available)
            .count()
    }

    fn sockets(&self) -> Vec<u32> {
        let mut sockets: Vec<u32> = self.cores.keys().map(|(s, _)| *s).collect();
        sockets.dedup();
        sockets
    }

    /// Allocate `count` hardware threads from a single socket.
    ///
    /// The first socket (ascending id) with enough available threads is
    /// chosen.  Whole free cores are consumed first; any remainder is taken
    /// thread-by-thread, core-by-core.  Returns the consumed thread ids in
    /// consumption order, or a typed error without consuming anything when
    /// no socket qualifies.
    pub fn allocate(&mut self, count: usize) -> Result<Vec<u32>, NumaError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut best_available = 0;
        let socket = self
            .sockets()
            .into_iter()
            .find(|socket| {
                let available = self.available_on_socket(*socket);
                best_available = best_available.max(available);
                available >= count
            })
            .ok_or(NumaError::InsufficientThreads {
                requested: count,
                best_available,
            })?;

        let mut taken: Vec<u32> = Vec::with_capacity(count);

        // Whole free cores first, while a full core still fits.
        for ((s, _core), slots) in &mut self.cores {
            if *s != socket || count - taken.len() < self.hyperthread_factor {
                continue;
            }
            if slots.iter().all(|slot| slot.available) {
                for slot in slots {
                    slot.available = false;
                    taken.push(slot.id);
                }
            }
        }

        // Remainder scattered across partially used cores.
        for ((s, _core), slots) in &mut self.cores {
            if *s != socket {
                continue;
            }
            for slot in slots {
                if taken.len() == count {
                    break;
                }
                if slot.available {
                    slot.available = false;
                    taken.push(slot.id);
                }
            }
        }

        debug!("allocated threads {taken:?} on socket {socket}");
        Ok(taken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::CpuThread;
    use pretty_assertions::assert_eq;

    /// 2 sockets x 6 cores x 2 threads; thread ids laid out linearly.
    fn topology() -> CpuTopology {
        let mut threads = Vec::new();
        let mut id = 0;
        for socket in 0..2 {
            for core in 0..6 {
                for _ in 0..2 {
                    threads.push(CpuThread { id, socket, core });
                    id += 1;
                }
            }
        }
        CpuTopology::from_threads(threads)
    }

    #[test]
    fn leading_cores_are_reserved() {
        let mut binder = NumaBinder::new(&topology());
        // 6 cores per socket, 2 reserved, 2 threads each -> 8 available.
        assert_eq!(binder.available_on_socket(0), 8);
        assert_eq!(binder.available_on_socket(1), 8);
        // Reserved thread ids 0..=3 (socket 0) never show up.
        let taken = binder.allocate(8).unwrap();
        assert!(taken.iter().all(|id| *id >= 4));
    }

    #[test]
    fn whole_cores_preferred_then_scatter() {
        let mut binder = NumaBinder::new(&topology());
        let taken = binder.allocate(5).unwrap();
        // Two whole cores (4, 5) and (6, 7), then one scattered thread.
        assert_eq!(taken, vec![4, 5, 6, 7, 8]);
    }

    #[test]
    fn single_socket_only() {
        let mut binder = NumaBinder::new(&topology());
        let taken = binder.allocate(8).unwrap();
        // Socket 0 has exactly 8 available; all of them, none from socket 1.
        assert!(taken.iter().all(|id| *id < 12));
        assert_eq!(taken.len(), 8);
    }

    #[test]
    fn sequential_allocations_never_overlap() {
        let mut binder = NumaBinder::new(&topology());
        let first = binder.allocate(6).unwrap();
        let second = binder.allocate(6).unwrap();
        assert!(first.iter().all(|id| !second.contains(id)));
    }

    #[test]
    fn spills_to_second_socket_when_first_is_drained() {
        let mut binder = NumaBinder::new(&topology());
        let first = binder.allocate(8).unwrap();
        assert!(first.iter().all(|id| *id < 12));
        let second = binder.allocate(4).unwrap();
        assert!(second.iter().all(|id| *id >= 12));
    }

    #[test]
    fn impossible_request_is_an_error() {
        let mut binder = NumaBinder::new(&topology());
        let err = binder.allocate(9).unwrap_err();
        match err {
            NumaError::InsufficientThreads {
                requested,
                best_available,
            } => {
                assert_eq!(requested, 9);
                assert_eq!(best_available, 8);
            }
            other => panic!("unexpected error: {other}"),
        }
        // The failed request consumed nothing.
        assert_eq!(binder.allocate(8).unwrap().len(), 8);
    }

    #[test]
    fn zero_request_is_empty() {
        let mut binder = NumaBinder::new(&topology());
        assert_eq!(binder.allocate(0).unwrap(), Vec::<u32>::new());
    }
}
