// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Guest CPU model and layout fragment.

use crate::{CmdLine, Element, TopologyError, TopologyResult};
use config::compute::CpuSection;

pub struct CpuElement {
    section: CpuSection,
}

impl CpuElement {
    #[must_use]
    pub fn new(section: CpuSection) -> CpuElement {
        CpuElement { section }
    }
}

impl Element for CpuElement {
    fn validate(&self) -> TopologyResult<()> {
        if self.section.count == 0 || self.section.sockets == 0 {
            return Err(TopologyError::Invalid(
                "cpu count and sockets must be non-zero".to_string(),
            ));
        }
        if self.section.count % self.section.sockets != 0 {
            return Err(TopologyError::Invalid(format!(
                "{} threads cannot split over {} sockets",
                self.section.count, self.section.sockets
            )));
        }
        Ok(())
    }

    fn render(&self, cmd: &mut CmdLine) -> TopologyResult<()> {
        let model = self.section.model.as_deref().unwrap_or("host");
        match &self.section.features {
            Some(features) => cmd.opt("-cpu", format!("{model},{features}")),
            None => cmd.opt("-cpu", model),
        }
        let cores = self.section.count / self.section.sockets;
        cmd.opt(
            "-smp",
            format!(
                "{},sockets={},cores={cores},threads=1",
                self.section.count, self.section.sockets
            ),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_model_and_layout() {
        let element = CpuElement::new(CpuSection {
            count: 8,
            sockets: 2,
            model: Some("Haswell".to_string()),
            features: Some("+vmx".to_string()),
            numa_pinned: false,
        });
        element.validate().unwrap();
        let mut cmd = CmdLine::new("qemu-system-x86_64");
        element.render(&mut cmd).unwrap();
        assert_eq!(
            cmd.render(),
            "qemu-system-x86_64 -cpu Haswell,+vmx -smp 8,sockets=2,cores=4,threads=1"
        );
    }

    #[test]
    fn uneven_socket_split_rejected() {
        let element = CpuElement::new(CpuSection {
            count: 5,
            sockets: 2,
            model: None,
            features: None,
            numa_pinned: false,
        });
        assert!(element.validate().is_err());
    }

    #[test]
    fn rendering_twice_adds_nothing() {
        let element = CpuElement::new(CpuSection {
            count: 2,
            sockets: 1,
            model: None,
            features: None,
            numa_pinned: false,
        });
        let mut cmd = CmdLine::new("qemu-system-x86_64");
        element.render(&mut cmd).unwrap();
        let first = cmd.args();
        element.render(&mut cmd).unwrap();
        assert_eq!(cmd.args(), first);
    }
}
