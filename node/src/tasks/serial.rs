// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Serial-over-LAN bridge task.
//!
//! A socat process that owns a PTY under the workspace and relays it to a
//! local TCP listener.  The BMC reads the PTY as the guest serial line;
//! the hypervisor's serial chardev connects to the TCP side.

use crate::task::{require_executable, Task};
use crate::NodeResult;
use std::path::{Path, PathBuf};
use supervisor::Supervisor;
use topology::CmdLine;

#[derive(Debug)]
pub struct SerialBridgeTask {
    pty_link: PathBuf,
    sol_port: u16,
    supervisor: Supervisor,
}

impl SerialBridgeTask {
    #[must_use]
    pub fn new(workspace: &Path, sol_port: u16, namespace: Option<String>) -> SerialBridgeTask {
        SerialBridgeTask {
            pty_link: workspace.join(".serial"),
            sol_port,
            supervisor: Supervisor::new("serial-bridge", workspace).namespace(namespace),
        }
    }

    /// Path of the PTY symlink the bridge maintains.
    #[must_use]
    pub fn pty_link(&self) -> &Path {
        &self.pty_link
    }
}

impl Task for SerialBridgeTask {
    fn name(&self) -> &str {
        "serial-bridge"
    }

    fn priority(&self) -> u8 {
        super::PRIORITY_SERIAL_BRIDGE
    }

    fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    fn precheck(&self) -> NodeResult<()> {
        require_executable("socat")
    }

    fn command(&self) -> NodeResult<CmdLine> {
        let mut cmd = CmdLine::new("socat");
        cmd.flag("-d");
        cmd.raw(format!(
            "pty,link={},raw,echo=0",
            self.pty_link.display()
        ));
        cmd.raw(format!(
            "tcp-listen:{},bind=127.0.0.1,reuseaddr,fork",
            self.sol_port
        ));
        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bridges_pty_to_tcp_listener() {
        let task = SerialBridgeTask::new(Path::new("/ws/n0"), 9003, None);
        assert_eq!(
            task.command().unwrap().render(),
            "socat -d pty,link=/ws/n0/.serial,raw,echo=0 \
             tcp-listen:9003,bind=127.0.0.1,reuseaddr,fork"
        );
        assert_eq!(task.pty_link(), Path::new("/ws/n0/.serial"));
    }
}
