// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Node configuration model: network interfaces

use crate::mac::Mac;
use crate::{ConfigError, ConfigResult};

/// How an emulated NIC is backed on the host.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    /// User-mode networking; no host configuration needed.
    #[default]
    Nat,
    /// Attach to an existing host bridge.  Requires a MAC address; one is
    /// synthesized during normalization if absent.
    Bridge,
}

/// Device model presented to the guest.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "kebab-case")]
pub enum NicModel {
    #[default]
    E1000,
    VirtioNet,
    Rtl8139,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub mode: NetworkMode,
    /// Host bridge name; required in bridge mode.
    #[serde(default)]
    pub bridge: Option<String>,
    #[serde(default)]
    pub model: NicModel,
    #[serde(default)]
    pub mac: Option<Mac>,
}

impl NetworkConfig {
    pub fn validate(&self) -> ConfigResult {
        if self.mode == NetworkMode::Bridge && self.bridge.is_none() {
            return Err(ConfigError::MissingField("network.bridge"));
        }
        if let Some(mac) = &self.mac {
            if mac.is_zero() || mac.is_multicast() {
                return Err(ConfigError::InvalidValue {
                    field: "network.mac",
                    reason: format!("{mac} is not a usable unicast address"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_mode_requires_bridge_name() {
        let cfg = NetworkConfig {
            mode: NetworkMode::Bridge,
            bridge: None,
            model: NicModel::default(),
            mac: None,
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MissingField("network.bridge"))
        ));
    }

    #[test]
    fn multicast_mac_rejected() {
        let cfg = NetworkConfig {
            mode: NetworkMode::Nat,
            bridge: None,
            model: NicModel::default(),
            mac: Some(Mac([0x01, 0, 0, 0, 0, 1])),
        };
        assert!(cfg.validate().is_err());
    }
}
