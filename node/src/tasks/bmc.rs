// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! BMC simulator task.
//!
//! Runs `ipmi_sim` with a generated lanserv configuration and the
//! profile's emulation data.  The configuration file is written once and
//! then left alone, so operator edits survive restarts; persistent BMC
//! state (SDRs, SEL) accumulates in a state directory under the
//! workspace.

use crate::task::{require_executable, Task};
use crate::{NodeError, NodeResult};
use config::node::BmcSection;
use config::profile::HardwareProfile;
use std::net::UdpSocket;
use std::path::{Path, PathBuf};
use supervisor::Supervisor;
use topology::CmdLine;
use tracing::{debug, info};

/// Where profile emulation data is installed.
const EMULATION_ROOT: &str = "/usr/share/vchassis";

#[derive(Debug)]
pub struct BmcTask {
    node_name: String,
    config_path: PathBuf,
    state_dir: PathBuf,
    section: BmcSection,
    profile: HardwareProfile,
    /// PTY the serial bridge maintains; `None` disables SOL in the
    /// generated configuration.
    serial_device: Option<PathBuf>,
    supervisor: Supervisor,
}

impl BmcTask {
    #[must_use]
    pub fn new(
        node_name: &str,
        workspace: &Path,
        profile: HardwareProfile,
        section: BmcSection,
        serial_device: Option<PathBuf>,
        namespace: Option<String>,
    ) -> BmcTask {
        BmcTask {
            node_name: node_name.to_string(),
            config_path: workspace.join("vbmc.conf"),
            state_dir: workspace.join("bmc-state"),
            section,
            profile,
            serial_device,
            supervisor: Supervisor::new("bmc", workspace).namespace(namespace),
        }
    }

    fn emulation_data(&self) -> PathBuf {
        Path::new(EMULATION_ROOT).join(self.profile.emulation_data())
    }

    /// Render the lanserv configuration for this node.
    fn render_config(&self) -> String {
        let mut out = format!("name \"{}\"\n\n", self.node_name);
        out.push_str("set_working_mc 0x20\n");
        out.push_str("  startlan 1\n");
        out.push_str(&format!(
            "    addr {} {}\n",
            self.section.address, self.section.port
        ));
        out.push_str("    priv_limit admin\n");
        out.push_str("    allowed_auths_admin none md2 md5 straight\n");
        out.push_str("  endlan\n");
        if let Some(device) = &self.serial_device {
            out.push_str(&format!("  sol \"{}\" 115200\n", device.display()));
        }
        out.push_str(&format!(
            "  serial 15 {} {} codec VM\n",
            self.section.address, self.section.vm_channel_port
        ));
        out.push_str(&format!(
            "user 2 true \"{}\" \"{}\" admin 10 none md2 md5 straight\n",
            self.section.username, self.section.password
        ));
        out
    }

    /// Write the configuration and state directory, keeping whatever is
    /// already there.
    fn prepare_files(&self) -> NodeResult<()> {
        if !self.state_dir.is_dir() {
            std::fs::create_dir_all(&self.state_dir).map_err(|source| NodeError::Workspace {
                path: self.state_dir.clone(),
                source,
            })?;
        }
        if self.config_path.exists() {
            debug!("keeping existing {}", self.config_path.display());
            return Ok(());
        }
        info!("writing BMC configuration {}", self.config_path.display());
        std::fs::write(&self.config_path, self.render_config()).map_err(|source| {
            NodeError::Workspace {
                path: self.config_path.clone(),
                source,
            }
        })
    }
}

impl Task for BmcTask {
    fn name(&self) -> &str {
        "bmc"
    }

    fn priority(&self) -> u8 {
        super::PRIORITY_BMC
    }

    fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    fn precheck(&self) -> NodeResult<()> {
        require_executable("ipmi_sim")?;
        // The IPMI LAN port must be free; a second BMC on the same port
        // would answer for the wrong node.
        match UdpSocket::bind((self.section.address.as_str(), self.section.port)) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => Err(NodeError::PortInUse {
                address: self.section.address.clone(),
                port: self.section.port,
            }),
            // Binding a privileged port can fail for reasons ipmi_sim
            // itself will not hit (it may run with more privilege).
            Err(e) => {
                debug!("IPMI port probe inconclusive: {e}");
                Ok(())
            }
        }
    }

    fn run(&self) -> NodeResult<()> {
        self.prepare_files()?;
        let command = self.command()?;
        debug!("task 'bmc' command: {}", command.render());
        self.supervisor.start(command.program(), &command.args())?;
        Ok(())
    }

    fn command(&self) -> NodeResult<CmdLine> {
        let mut cmd = CmdLine::new("ipmi_sim");
        cmd.opt("-c", self.config_path.display().to_string());
        cmd.opt("-f", self.emulation_data().display().to_string());
        cmd.opt("-s", self.state_dir.display().to_string());
        // No interactive console; the process is fully supervised.
        cmd.flag("-n");
        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn task(serial_device: Option<PathBuf>) -> BmcTask {
        BmcTask::new(
            "n0",
            Path::new("/ws/n0"),
            HardwareProfile::QuantaD51,
            BmcSection::default(),
            serial_device,
            None,
        )
    }

    #[test]
    fn command_names_config_emulation_and_state() {
        let cmd = task(None).command().unwrap();
        assert_eq!(
            cmd.render(),
            "ipmi_sim -c /ws/n0/vbmc.conf -f /usr/share/vchassis/quanta_d51.emu \
             -s /ws/n0/bmc-state -n"
        );
    }

    #[test]
    fn sol_line_follows_serial_device() {
        let without = task(None).render_config();
        assert!(!without.contains("sol \""));

        let with = task(Some(PathBuf::from("/ws/n0/.serial"))).render_config();
        assert!(with.contains("sol \"/ws/n0/.serial\" 115200"));
        assert!(with.contains("addr 127.0.0.1 623"));
        assert!(with.contains("user 2 true \"admin\" \"admin\""));
    }

    #[test]
    fn existing_config_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let task = BmcTask::new(
            "n0",
            dir.path(),
            HardwareProfile::Generic,
            BmcSection::default(),
            None,
            None,
        );
        std::fs::write(dir.path().join("vbmc.conf"), "# operator edited\n").unwrap();
        task.prepare_files().unwrap();
        let kept = std::fs::read_to_string(dir.path().join("vbmc.conf")).unwrap();
        assert_eq!(kept, "# operator edited\n");
        assert!(dir.path().join("bmc-state").is_dir());
    }

    #[test]
    fn fresh_config_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let task = BmcTask::new(
            "n0",
            dir.path(),
            HardwareProfile::Generic,
            BmcSection::default(),
            None,
            None,
        );
        task.prepare_files().unwrap();
        let written = std::fs::read_to_string(dir.path().join("vbmc.conf")).unwrap();
        assert!(written.starts_with("name \"n0\""));
    }
}
