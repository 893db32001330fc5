// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Hypervisor task.
//!
//! Resolution happens once, at node construction: PCI bridge buses are
//! numbered, storage controllers placed behind them, and pinned hardware
//! threads allocated.  The command line is then a pure function of the
//! resolved state.
//!
//! Termination first asks the guest to power down over QMP and only
//! escalates to signals when the guest does not oblige within the grace
//! window.

use crate::qmp;
use crate::task::{require_executable, Task};
use crate::{NodeError, NodeResult};
use config::compute::ComputeSection;
use config::node::BmcSection;
use numa::binder::NumaBinder;
use std::path::{Path, PathBuf};
use std::time::Duration;
use supervisor::{Supervisor, TaskState};
use topology::control::ControlChannel;
use topology::cpu::CpuElement;
use topology::memory::MemoryElement;
use topology::mgmt::ManagementInterface;
use topology::network::NetworkElement;
use topology::{CmdLine, Element, PciTopology, StorageTopology};
use tracing::{debug, info, warn};

const HYPERVISOR: &str = "qemu-system-x86_64";

/// How long the guest gets to act on a QMP power-down request before
/// signal-based termination takes over.
const GRACEFUL_POWERDOWN: Duration = Duration::from_secs(120);

#[derive(Debug)]
pub struct ComputeTask {
    node_name: String,
    section: ComputeSection,
    bmc: BmcSection,
    /// Serial bridge port the guest serial connects to; `None` when SOL is
    /// disabled.
    serial_port: Option<u16>,
    pci: PciTopology,
    storage: StorageTopology,
    /// Host hardware threads the guest is pinned to; empty means no
    /// pinning.
    pinned_threads: Vec<u32>,
    qmp_socket: PathBuf,
    supervisor: Supervisor,
}

impl ComputeTask {
    /// Resolve the full hardware topology for one compute section.
    ///
    /// Pinned thread allocation consumes threads from `binder` and is not
    /// rolled back if a later step fails; the binder is a per-run snapshot,
    /// not persistent state.
    pub fn resolve(
        node_name: &str,
        workspace: &Path,
        section: ComputeSection,
        bmc: BmcSection,
        serial_port: Option<u16>,
        namespace: Option<String>,
        binder: Option<&mut NumaBinder>,
    ) -> NodeResult<ComputeTask> {
        let pci = PciTopology::resolve(&section.pci_bridge_topology);
        let storage = StorageTopology::resolve(
            &section.storage_backend,
            workspace,
            &mut pci.attachable_buses(),
        )?;
        let pinned_threads = if section.cpu.numa_pinned {
            let binder = binder.ok_or_else(|| {
                NodeError::Numa(numa::NumaError::TopologyUnreadable(
                    "no host topology snapshot for a pinned node".to_string(),
                ))
            })?;
            binder.allocate(usize::try_from(section.cpu.count).unwrap_or(usize::MAX))?
        } else {
            Vec::new()
        };
        Ok(ComputeTask {
            node_name: node_name.to_string(),
            section,
            bmc,
            serial_port,
            pci,
            storage,
            pinned_threads,
            qmp_socket: workspace.join(".qmp"),
            supervisor: Supervisor::new("compute", workspace).namespace(namespace),
        })
    }

    #[must_use]
    pub fn qmp_socket(&self) -> &Path {
        &self.qmp_socket
    }

    fn emit(element: &dyn Element, cmd: &mut CmdLine) -> NodeResult<()> {
        element.validate()?;
        element.render(cmd)?;
        Ok(())
    }
}

impl Task for ComputeTask {
    fn name(&self) -> &str {
        "compute"
    }

    fn priority(&self) -> u8 {
        super::PRIORITY_COMPUTE
    }

    fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    fn precheck(&self) -> NodeResult<()> {
        require_executable(HYPERVISOR)?;
        if !self.pinned_threads.is_empty() {
            require_executable("taskset")?;
        }
        if self.section.kvm_enabled && !Path::new("/dev/kvm").exists() {
            warn!("/dev/kvm is absent; '{}' will run unaccelerated", self.node_name);
        }
        Ok(())
    }

    fn run(&self) -> NodeResult<()> {
        self.storage.ensure_backing_files()?;
        let command = self.command()?;
        debug!("task 'compute' command: {}", command.render());
        self.supervisor.start(command.program(), &command.args())?;
        Ok(())
    }

    fn terminate(&self) -> NodeResult<()> {
        if matches!(self.supervisor.status()?, TaskState::Running { .. }) {
            match qmp::request_powerdown(&self.qmp_socket) {
                Ok(()) => {
                    if self.supervisor.wait_stopped(GRACEFUL_POWERDOWN) {
                        info!("'{}' guest powered down cooperatively", self.node_name);
                    } else {
                        warn!(
                            "'{}' guest ignored the power-down request for {GRACEFUL_POWERDOWN:?}",
                            self.node_name
                        );
                    }
                }
                Err(e) => warn!("graceful power-down unavailable: {e}"),
            }
        }
        self.supervisor.stop()?;
        Ok(())
    }

    fn command(&self) -> NodeResult<CmdLine> {
        let mut cmd = if self.pinned_threads.is_empty() {
            CmdLine::new(HYPERVISOR)
        } else {
            let threads: Vec<String> = self.pinned_threads.iter().map(ToString::to_string).collect();
            let mut cmd = CmdLine::new("taskset");
            cmd.opt("-c", threads.join(","));
            cmd.raw(HYPERVISOR);
            cmd
        };
        cmd.opt("-name", &self.node_name);
        cmd.opt("-machine", "q35,usb=off");
        if self.section.kvm_enabled && Path::new("/dev/kvm").exists() {
            cmd.flag("-enable-kvm");
        }
        if let Some(order) = &self.section.boot_order {
            cmd.opt("-boot", format!("order={order}"));
        }
        if let Some(smbios) = &self.section.smbios {
            cmd.opt("-smbios", smbios);
        }

        Self::emit(&CpuElement::new(self.section.cpu.clone()), &mut cmd)?;
        Self::emit(&MemoryElement::new(self.section.memory.clone()), &mut cmd)?;
        for (index, network) in self.section.networks.iter().enumerate() {
            Self::emit(&NetworkElement::new(index, network.clone()), &mut cmd)?;
        }
        Self::emit(&self.pci, &mut cmd)?;
        Self::emit(&self.storage, &mut cmd)?;
        Self::emit(
            &ManagementInterface::new(self.bmc.address.clone(), self.bmc.vm_channel_port),
            &mut cmd,
        )?;
        Self::emit(
            &ControlChannel::new(self.qmp_socket.clone(), self.serial_port),
            &mut cmd,
        )?;

        match self.section.vnc_display {
            Some(display) => cmd.opt("-vnc", format!(":{display}")),
            None => cmd.flag("-nographic"),
        }
        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::compute::{CpuSection, MemorySection};
    use config::pci::BridgeConfig;
    use config::storage::{CacheMode, ControllerConfig, ControllerKind, DiskFormat, DriveConfig};
    use numa::topology::{CpuThread, CpuTopology};
    use pretty_assertions::assert_eq;

    fn section() -> ComputeSection {
        ComputeSection {
            cpu: CpuSection {
                count: 2,
                sockets: 1,
                model: None,
                features: None,
                numa_pinned: false,
            },
            memory: MemorySection { size_mib: 1024 },
            networks: vec![],
            storage_backend: vec![],
            pci_bridge_topology: vec![],
            kvm_enabled: false,
            boot_order: None,
            vnc_display: None,
            smbios: None,
        }
    }

    fn resolve(section: ComputeSection, binder: Option<&mut NumaBinder>) -> ComputeTask {
        ComputeTask::resolve(
            "n0",
            Path::new("/ws/n0"),
            section,
            BmcSection::default(),
            Some(9003),
            None,
            binder,
        )
        .unwrap()
    }

    #[test]
    fn command_covers_every_fragment() {
        let mut section = section();
        section.boot_order = Some("ncd".to_string());
        section.storage_backend.push(ControllerConfig {
            kind: ControllerKind::Ahci,
            max_drives: 6,
            behind_pci_bridge: false,
            drives: vec![DriveConfig {
                size_gib: 8,
                file: None,
                format: DiskFormat::Qcow2,
                cache: CacheMode::Writeback,
                serial: None,
                wwn: None,
            }],
        });
        let task = resolve(section, None);
        let rendered = task.command().unwrap().render();
        assert!(rendered.starts_with("qemu-system-x86_64 -name n0 -machine q35,usb=off"));
        assert!(rendered.contains("-boot order=ncd"));
        assert!(rendered.contains("-smp 2,sockets=1,cores=2,threads=1"));
        assert!(rendered.contains("-m 1024"));
        assert!(rendered.contains("bus=sata0.0"));
        assert!(rendered.contains("-device isa-ipmi-kcs,bmc=bmc0"));
        assert!(rendered.contains("-qmp unix:/ws/n0/.qmp,server,nowait"));
        assert!(rendered.contains("-serial chardev:serial0"));
        assert!(rendered.ends_with("-nographic"));
    }

    #[test]
    fn pinned_node_is_wrapped_in_taskset() {
        // One socket, four cores, no hyperthreading; the first two cores
        // are reserved for the host.
        let threads: Vec<CpuThread> = (0..4)
            .map(|id| CpuThread {
                id,
                socket: 0,
                core: id,
            })
            .collect();
        let mut binder = NumaBinder::new(&CpuTopology::from_threads(threads));
        let mut section = section();
        section.cpu.numa_pinned = true;
        let task = resolve(section, Some(&mut binder));
        let rendered = task.command().unwrap().render();
        assert!(rendered.starts_with("taskset -c 2,3 qemu-system-x86_64"));
    }

    #[test]
    fn pinned_node_without_topology_snapshot_is_rejected() {
        let mut section = section();
        section.cpu.numa_pinned = true;
        let err = ComputeTask::resolve(
            "n0",
            Path::new("/ws/n0"),
            section,
            BmcSection::default(),
            None,
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, NodeError::Numa(_)));
    }

    #[test]
    fn bridged_controller_consumes_an_attachable_bus() {
        let mut section = section();
        section.pci_bridge_topology.push(BridgeConfig {
            device: "pci-bridge".to_string(),
            chassis: None,
            addr: None,
            multifunction: false,
            attachable: true,
            downstream_bridge: vec![],
        });
        section.storage_backend.push(ControllerConfig {
            kind: ControllerKind::Sas,
            max_drives: 8,
            behind_pci_bridge: true,
            drives: vec![DriveConfig {
                size_gib: 8,
                file: None,
                format: DiskFormat::Raw,
                cache: CacheMode::Writeback,
                serial: None,
                wwn: None,
            }],
        });
        let task = resolve(section, None);
        let rendered = task.command().unwrap().render();
        assert!(rendered.contains("-device pci-bridge,id=pci_bridge_1,bus=pcie.0"));
        assert!(rendered.contains("bus=pci_bridge_1"));
    }

    #[test]
    fn vnc_display_replaces_nographic() {
        let mut section = section();
        section.vnc_display = Some(2);
        let task = resolve(section, None);
        let rendered = task.command().unwrap().render();
        assert!(rendered.contains("-vnc :2"));
        assert!(!rendered.contains("-nographic"));
    }
}
