// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Emulated NIC fragment.

use crate::{CmdLine, Element, TopologyError, TopologyResult};
use config::network::{NetworkConfig, NetworkMode};

pub struct NetworkElement {
    /// Position among the node's NICs; feeds the netdev id.
    index: usize,
    config: NetworkConfig,
}

impl NetworkElement {
    #[must_use]
    pub fn new(index: usize, config: NetworkConfig) -> NetworkElement {
        NetworkElement { index, config }
    }
}

impl Element for NetworkElement {
    fn validate(&self) -> TopologyResult<()> {
        if self.config.mode == NetworkMode::Bridge {
            if self.config.bridge.is_none() {
                return Err(TopologyError::Invalid(format!(
                    "network #{} is bridge mode without a bridge name",
                    self.index
                )));
            }
            // Normalization synthesizes missing bridge MACs before elements
            // are built; reaching render without one is a config bug.
            if self.config.mac.is_none() {
                return Err(TopologyError::Invalid(format!(
                    "network #{} is bridge mode without a MAC",
                    self.index
                )));
            }
        }
        Ok(())
    }

    fn render(&self, cmd: &mut CmdLine) -> TopologyResult<()> {
        let netdev = format!("netdev{}", self.index);
        match self.config.mode {
            NetworkMode::Nat => cmd.opt("-netdev", format!("user,id={netdev}")),
            NetworkMode::Bridge => {
                let bridge = self.config.bridge.as_deref().unwrap_or_default();
                cmd.opt("-netdev", format!("bridge,id={netdev},br={bridge}"));
            }
        }
        let mut device = format!("{},netdev={netdev}", self.config.model);
        if let Some(mac) = &self.config.mac {
            device.push_str(&format!(",mac={mac}"));
        }
        cmd.opt("-device", device);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::mac::Mac;
    use config::network::NicModel;
    use std::str::FromStr;

    #[test]
    fn bridge_nic_renders_backend_and_device() {
        let element = NetworkElement::new(
            0,
            NetworkConfig {
                mode: NetworkMode::Bridge,
                bridge: Some("br0".to_string()),
                model: NicModel::VirtioNet,
                mac: Some(Mac::from_str("52:54:00:12:34:56").unwrap()),
            },
        );
        element.validate().unwrap();
        let mut cmd = CmdLine::new("qemu-system-x86_64");
        element.render(&mut cmd).unwrap();
        assert_eq!(
            cmd.render(),
            "qemu-system-x86_64 -netdev bridge,id=netdev0,br=br0 \
             -device virtio-net,netdev=netdev0,mac=52:54:00:12:34:56"
        );
    }

    #[test]
    fn macless_bridge_nic_fails_validation() {
        let element = NetworkElement::new(
            1,
            NetworkConfig {
                mode: NetworkMode::Bridge,
                bridge: Some("br0".to_string()),
                model: NicModel::E1000,
                mac: None,
            },
        );
        assert!(element.validate().is_err());
    }
}
