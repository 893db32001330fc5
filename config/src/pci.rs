// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Node configuration model: PCI bridge trees

use crate::{ConfigError, ConfigResult};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BridgeConfig {
    /// Device model, e.g. `pci-bridge` or `x3130-upstream`.
    pub device: String,
    #[serde(default)]
    pub chassis: Option<u8>,
    /// Slot address on the parent bus, e.g. `0x1e`.
    #[serde(default)]
    pub addr: Option<String>,
    #[serde(default)]
    pub multifunction: bool,
    /// Whether downstream devices (storage controllers) may attach here.
    #[serde(default)]
    pub attachable: bool,
    #[serde(default)]
    pub downstream_bridge: Vec<BridgeConfig>,
}

impl BridgeConfig {
    pub fn validate(&self) -> ConfigResult {
        if self.device.is_empty() {
            return Err(ConfigError::MissingField("pci_bridge.device"));
        }
        for child in &self.downstream_bridge {
            child.validate()?;
        }
        Ok(())
    }
}
