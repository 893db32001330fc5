// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Control channel fragments: the QMP monitor socket and, when
//! serial-over-LAN is enabled, the guest serial chardev feeding the serial
//! bridge.
//!
//! The QMP socket is the channel `terminate()` uses to ask the guest for a
//! graceful power-down before escalating to signals.

use crate::{CmdLine, Element, TopologyError, TopologyResult};
use std::path::PathBuf;

pub struct ControlChannel {
    /// Unix socket path for the QMP monitor, under the node workspace.
    qmp_socket: PathBuf,
    /// TCP port of the serial bridge; `None` leaves the guest serial
    /// disconnected.
    serial_port: Option<u16>,
}

impl ControlChannel {
    #[must_use]
    pub fn new(qmp_socket: PathBuf, serial_port: Option<u16>) -> ControlChannel {
        ControlChannel {
            qmp_socket,
            serial_port,
        }
    }

    #[must_use]
    pub fn qmp_socket(&self) -> &PathBuf {
        &self.qmp_socket
    }
}

impl Element for ControlChannel {
    fn validate(&self) -> TopologyResult<()> {
        if self.qmp_socket.as_os_str().is_empty() {
            return Err(TopologyError::Invalid("QMP socket path is empty".to_string()));
        }
        if self.serial_port == Some(0) {
            return Err(TopologyError::Invalid("serial port is 0".to_string()));
        }
        Ok(())
    }

    fn render(&self, cmd: &mut CmdLine) -> TopologyResult<()> {
        cmd.opt(
            "-qmp",
            format!("unix:{},server,nowait", self.qmp_socket.display()),
        );
        if let Some(port) = self.serial_port {
            cmd.opt(
                "-chardev",
                format!("socket,id=serial0,host=127.0.0.1,port={port},reconnect=10"),
            );
            cmd.opt("-serial", "chardev:serial0");
        }
        Ok(())
    }
}
