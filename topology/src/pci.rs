// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! PCI bridge topology assignment.
//!
//! Bridge trees from the config are flattened by a depth-first pre-order
//! walk with a single bus counter: the first root bridge gets bus 1, each
//! child the next unused number starting at its parent's bus + 1.  Root
//! bridges attach directly under bus 0.

use crate::{CmdLine, Element, TopologyResult};
use config::pci::BridgeConfig;

/// The root bus every top-level bridge hangs off.
pub const ROOT_BUS: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBridge {
    pub bus: u32,
    pub parent: u32,
    pub device: String,
    pub chassis: u8,
    pub addr: Option<String>,
    pub multifunction: bool,
    pub attachable: bool,
}

impl ResolvedBridge {
    /// Device id used to reference this bridge as a bus.
    #[must_use]
    pub fn id(&self) -> String {
        format!("pci_bridge_{}", self.bus)
    }

    fn parent_id(&self) -> String {
        if self.parent == ROOT_BUS {
            "pcie.0".to_string()
        } else {
            format!("pci_bridge_{}", self.parent)
        }
    }
}

/// The fully numbered bridge tree, flattened in assignment order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PciTopology {
    bridges: Vec<ResolvedBridge>,
}

impl PciTopology {
    /// Number the given bridge trees.
    #[must_use]
    pub fn resolve(specs: &[BridgeConfig]) -> PciTopology {
        let mut topology = PciTopology::default();
        let mut next_bus = 1;
        for spec in specs {
            topology.visit(spec, ROOT_BUS, &mut next_bus);
        }
        topology
    }

    fn visit(&mut self, spec: &BridgeConfig, parent: u32, next_bus: &mut u32) {
        let bus = *next_bus;
        *next_bus += 1;
        self.bridges.push(ResolvedBridge {
            bus,
            parent,
            device: spec.device.clone(),
            // chassis numbers must be unique per bridge; the bus number
            // already is, so it doubles as the default.
            chassis: spec.chassis.unwrap_or(u8::try_from(bus % 256).unwrap_or(0)),
            addr: spec.addr.clone(),
            multifunction: spec.multifunction,
            attachable: spec.attachable,
        });
        for child in &spec.downstream_bridge {
            self.visit(child, bus, next_bus);
        }
    }

    #[must_use]
    pub fn bridges(&self) -> &[ResolvedBridge] {
        &self.bridges
    }

    /// Buses usable by downstream attachers (storage controllers that must
    /// sit behind a specific bridge), in assignment order.
    pub fn attachable_buses(&self) -> impl Iterator<Item = u32> + '_ {
        self.bridges
            .iter()
            .filter(|bridge| bridge.attachable)
            .map(|bridge| bridge.bus)
    }
}

impl Element for PciTopology {
    fn validate(&self) -> TopologyResult<()> {
        Ok(())
    }

    fn render(&self, cmd: &mut CmdLine) -> TopologyResult<()> {
        for bridge in &self.bridges {
            let mut device = format!(
                "{},id={},bus={},chassis={}",
                bridge.device,
                bridge.id(),
                bridge.parent_id(),
                bridge.chassis
            );
            if let Some(addr) = &bridge.addr {
                device.push_str(&format!(",addr={addr}"));
            }
            if bridge.multifunction {
                device.push_str(",multifunction=on");
            }
            cmd.opt("-device", device);
        }
        Ok(())
    }
}
