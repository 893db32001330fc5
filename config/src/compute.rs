// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Node configuration model: the compute (hypervisor) section

use crate::network::NetworkConfig;
use crate::pci::BridgeConfig;
use crate::storage::ControllerConfig;
use crate::{ConfigError, ConfigResult};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CpuSection {
    /// Total guest hardware threads.
    pub count: u32,
    #[serde(default = "default_sockets")]
    pub sockets: u32,
    /// Guest CPU model string, e.g. `host` or `Haswell`.
    #[serde(default)]
    pub model: Option<String>,
    /// Extra CPU feature flags appended to the model.
    #[serde(default)]
    pub features: Option<String>,
    /// Pin guest threads to host threads allocated from one NUMA socket.
    #[serde(default)]
    pub numa_pinned: bool,
}

fn default_sockets() -> u32 {
    1
}

impl CpuSection {
    pub fn validate(&self) -> ConfigResult {
        if self.count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "compute.cpu.count",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.sockets == 0 || self.count % self.sockets != 0 {
            return Err(ConfigError::InvalidValue {
                field: "compute.cpu.sockets",
                reason: format!("{} threads cannot split over {} sockets", self.count, self.sockets),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MemorySection {
    pub size_mib: u32,
}

impl MemorySection {
    pub fn validate(&self) -> ConfigResult {
        if self.size_mib == 0 {
            return Err(ConfigError::InvalidValue {
                field: "compute.memory.size_mib",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ComputeSection {
    pub cpu: CpuSection,
    pub memory: MemorySection,
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
    #[serde(default)]
    pub storage_backend: Vec<ControllerConfig>,
    #[serde(default)]
    pub pci_bridge_topology: Vec<BridgeConfig>,
    /// Use KVM acceleration when `/dev/kvm` is present.
    #[serde(default = "default_true")]
    pub kvm_enabled: bool,
    /// Guest boot order string, e.g. `ncd`.
    #[serde(default)]
    pub boot_order: Option<String>,
    /// VNC display index; the listen port is 5900 + index.
    #[serde(default)]
    pub vnc_display: Option<u16>,
    /// SMBIOS type-1 strings passed through to the guest.
    #[serde(default)]
    pub smbios: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ComputeSection {
    /// True when the section carries nothing to emulate.  A node with an
    /// empty compute section is rejected at `init()`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cpu.count == 0 && self.memory.size_mib == 0
    }

    pub fn validate(&self) -> ConfigResult {
        self.cpu.validate()?;
        self.memory.validate()?;
        for network in &self.networks {
            network.validate()?;
        }
        for controller in &self.storage_backend {
            controller.validate()?;
        }
        for bridge in &self.pci_bridge_topology {
            bridge.validate()?;
        }
        Ok(())
    }
}
