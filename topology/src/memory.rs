// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Guest memory fragment.

use crate::{CmdLine, Element, TopologyError, TopologyResult};
use config::compute::MemorySection;

pub struct MemoryElement {
    section: MemorySection,
}

impl MemoryElement {
    #[must_use]
    pub fn new(section: MemorySection) -> MemoryElement {
        MemoryElement { section }
    }
}

impl Element for MemoryElement {
    fn validate(&self) -> TopologyResult<()> {
        if self.section.size_mib == 0 {
            return Err(TopologyError::Invalid("memory size must be non-zero".to_string()));
        }
        Ok(())
    }

    fn render(&self, cmd: &mut CmdLine) -> TopologyResult<()> {
        cmd.opt("-m", self.section.size_mib.to_string());
        Ok(())
    }
}
