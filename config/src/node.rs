// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Node configuration model: the node itself

use crate::compute::ComputeSection;
use crate::mac::Mac;
use crate::network::NetworkMode;
use crate::profile::HardwareProfile;
use crate::storage::ControllerKind;
use crate::{ConfigError, ConfigResult};
use derive_builder::Builder;
use std::path::PathBuf;
use tracing::debug;

/// The BMC (ipmi_sim) section.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BmcSection {
    #[serde(default = "default_bmc_address")]
    pub address: String,
    #[serde(default = "default_ipmi_port")]
    pub port: u16,
    #[serde(default = "default_credential")]
    pub username: String,
    #[serde(default = "default_credential")]
    pub password: String,
    /// TCP port the BMC forwards serial-over-LAN traffic to.
    #[serde(default = "default_sol_port")]
    pub sol_port: u16,
    /// TCP port the BMC listens on for the hypervisor's IPMI chardev.
    #[serde(default = "default_vm_channel_port")]
    pub vm_channel_port: u16,
}

impl Default for BmcSection {
    fn default() -> Self {
        BmcSection {
            address: default_bmc_address(),
            port: default_ipmi_port(),
            username: default_credential(),
            password: default_credential(),
            sol_port: default_sol_port(),
            vm_channel_port: default_vm_channel_port(),
        }
    }
}

fn default_bmc_address() -> String {
    "127.0.0.1".to_string()
}

fn default_ipmi_port() -> u16 {
    623
}

fn default_credential() -> String {
    "admin".to_string()
}

fn default_sol_port() -> u16 {
    9003
}

fn default_vm_channel_port() -> u16 {
    9002
}

/// The optional monitor section; presence enables the monitor task.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MonitorSection {
    #[serde(default = "default_monitor_port")]
    pub port: u16,
}

fn default_monitor_port() -> u16 {
    9005
}

/// One simulated machine, as described by the operator.
///
/// The node is reconstructed from this description on every CLI invocation;
/// nothing about it is retained in memory across invocations.
#[derive(Debug, Clone, PartialEq, Builder, serde::Serialize, serde::Deserialize)]
#[builder(setter(into, strip_option), default)]
pub struct NodeConfig {
    /// Unique node name; doubles as the workspace directory name.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile: HardwareProfile,
    /// Network namespace to run every task in.  The namespace must already
    /// exist; it is entered, never created.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Enable the serial-over-LAN bridge task.
    #[serde(default)]
    pub sol_enabled: bool,
    #[serde(default)]
    pub compute: Option<ComputeSection>,
    #[serde(default)]
    pub bmc: BmcSection,
    #[serde(default)]
    pub monitor: Option<MonitorSection>,
    /// Root under which the node workspace is created.
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            name: String::new(),
            profile: HardwareProfile::default(),
            namespace: None,
            sol_enabled: false,
            compute: None,
            bmc: BmcSection::default(),
            monitor: None,
            workspace_root: None,
        }
    }
}

impl NodeConfig {
    /// Fail-fast validation of the full description.
    ///
    /// A missing name or a missing/empty compute section is rejected here,
    /// before any task is built or any process launched.
    pub fn validate(&self) -> ConfigResult {
        if self.name.is_empty() {
            return Err(ConfigError::MissingField("name"));
        }
        let Some(compute) = &self.compute else {
            return Err(ConfigError::EmptyCompute);
        };
        if compute.is_empty() {
            return Err(ConfigError::EmptyCompute);
        }
        compute.validate()
    }

    /// Fill fields the model synthesizes when absent.
    ///
    /// - bridge-mode interfaces without a MAC get a locally administered one;
    /// - NVMe drives without a serial get a random one.
    ///
    /// Required fields are never defaulted here; that is `validate()`'s
    /// territory.
    pub fn normalize(&mut self) {
        let Some(compute) = &mut self.compute else {
            return;
        };
        for network in &mut compute.networks {
            if network.mode == NetworkMode::Bridge && network.mac.is_none() {
                let mac = Mac::synthesize();
                debug!("synthesized MAC {mac} for bridge interface");
                network.mac = Some(mac);
            }
        }
        for controller in &mut compute.storage_backend {
            if controller.kind != ControllerKind::Nvme {
                continue;
            }
            for drive in &mut controller.drives {
                if drive.serial.is_none() {
                    let serial = format!("{:08x}", rand::random::<u32>());
                    debug!("synthesized serial {serial} for nvme drive");
                    drive.serial = Some(serial);
                }
            }
        }
    }
}
