// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! The node's task set.
//!
//! Priorities are fixed by the wiring between the processes: the serial
//! bridge must own its PTY before the BMC opens it, the BMC must listen
//! before the hypervisor's IPMI chardev connects, and the console and
//! monitor attach to whatever is already up.

pub mod bmc;
pub mod compute;
pub mod console;
pub mod monitor;
pub mod serial;

pub use bmc::BmcTask;
pub use compute::ComputeTask;
pub use console::ConsoleTask;
pub use monitor::MonitorTask;
pub use serial::SerialBridgeTask;

pub(crate) const PRIORITY_SERIAL_BRIDGE: u8 = 0;
pub(crate) const PRIORITY_BMC: u8 = 1;
pub(crate) const PRIORITY_COMPUTE: u8 = 2;
pub(crate) const PRIORITY_CONSOLE: u8 = 3;
pub(crate) const PRIORITY_MONITOR: u8 = 4;
