// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Management interface fragment.
//!
//! Connects the guest's IPMI KCS interface to the external BMC simulator
//! through a reconnecting chardev socket.  The BMC side must be listening
//! before the compute task starts; node orchestration guarantees that by
//! starting the BMC task at a higher priority.

use crate::{CmdLine, Element, TopologyError, TopologyResult};

pub struct ManagementInterface {
    /// Address the BMC simulator listens on for the VM channel.
    address: String,
    port: u16,
}

impl ManagementInterface {
    #[must_use]
    pub fn new(address: impl Into<String>, port: u16) -> ManagementInterface {
        ManagementInterface {
            address: address.into(),
            port,
        }
    }
}

impl Element for ManagementInterface {
    fn validate(&self) -> TopologyResult<()> {
        if self.address.is_empty() {
            return Err(TopologyError::Invalid("BMC address is empty".to_string()));
        }
        if self.port == 0 {
            return Err(TopologyError::Invalid("BMC VM channel port is 0".to_string()));
        }
        Ok(())
    }

    fn render(&self, cmd: &mut CmdLine) -> TopologyResult<()> {
        cmd.opt(
            "-chardev",
            format!(
                "socket,id=ipmi0,host={},port={},reconnect=10",
                self.address, self.port
            ),
        );
        cmd.opt("-device", "ipmi-bmc-extern,chardev=ipmi0,id=bmc0");
        cmd.opt("-device", "isa-ipmi-kcs,bmc=bmc0");
        Ok(())
    }
}
