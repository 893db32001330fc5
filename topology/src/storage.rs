// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Storage controller and drive assignment.
//!
//! Drives are bin-packed across controller instances: a controller spec
//! with `d` drives and a `max_drives` of `m` yields `ceil(d/m)` instances,
//! drive `i` landing on bus `start + i / m` at unit `i % m`.  AHCI-family
//! controllers and SCSI-family controllers (SAS, MegaRAID) number their
//! buses in two independent spaces because they render as different bus
//! types on the target command line.
//!
//! Rendering order per controller is host-side drive options, device-side
//! drive options, then the controller devices, concatenated in spec order;
//! the target interprets position as precedence (first drive is bootable).

use crate::{CmdLine, Element, TopologyError, TopologyResult};
use config::storage::{CacheMode, ControllerConfig, ControllerKind, DiskFormat};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Bytes per GiB of configured drive capacity.
const GIB: u64 = 1 << 30;

/// Bus-numbering family of a controller kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BusFamily {
    Sata,
    Scsi,
    Nvme,
}

impl BusFamily {
    fn of(kind: ControllerKind) -> BusFamily {
        match kind {
            ControllerKind::Ahci => BusFamily::Sata,
            ControllerKind::Sas | ControllerKind::Megaraid => BusFamily::Scsi,
            ControllerKind::Nvme => BusFamily::Nvme,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            BusFamily::Sata => "sata",
            BusFamily::Scsi => "scsi",
            BusFamily::Nvme => "nvme",
        }
    }
}

fn controller_model(kind: ControllerKind) -> &'static str {
    match kind {
        ControllerKind::Ahci => "ahci",
        ControllerKind::Sas => "megasas",
        ControllerKind::Megaraid => "megasas-gen2",
        ControllerKind::Nvme => "nvme",
    }
}

/// One drive with its bus coordinates assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDrive {
    pub id: String,
    pub file: PathBuf,
    pub size_gib: u32,
    pub format: DiskFormat,
    pub cache: CacheMode,
    pub serial: Option<String>,
    pub wwn: Option<u64>,
    pub bus: u32,
    pub unit: u32,
}

/// One controller spec with instances counted and drives placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedController {
    pub kind: ControllerKind,
    /// First bus index of this spec within its family numbering space.
    pub start_index: u32,
    /// Number of controller instances this spec expands to.
    pub instances: u32,
    /// Attachable PCI bridge bus the instances sit behind, if requested.
    pub pci_bus: Option<u32>,
    pub drives: Vec<ResolvedDrive>,
}

/// The fully assigned storage topology of one compute task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageTopology {
    controllers: Vec<ResolvedController>,
}

impl StorageTopology {
    /// Place every drive of every controller spec, in spec order.
    ///
    /// `attachable_buses` feeds controllers that asked to sit behind a PCI
    /// bridge; running out of attachable buses is a hard error, no
    /// controller is silently left on the root bus.
    pub fn resolve(
        specs: &[ControllerConfig],
        workspace: &Path,
        attachable_buses: &mut dyn Iterator<Item = u32>,
    ) -> TopologyResult<StorageTopology> {
        let mut sata_index = 0u32;
        let mut scsi_index = 0u32;
        let mut nvme_index = 0u32;
        let mut controllers = Vec::with_capacity(specs.len());

        for (spec_index, spec) in specs.iter().enumerate() {
            // An empty controller renders nothing and consumes no bus index.
            if spec.drives.is_empty() {
                debug!("controller #{spec_index} has no drives; skipped");
                continue;
            }
            if spec.max_drives == 0 {
                return Err(TopologyError::Invalid(format!(
                    "controller #{spec_index} has max_drives = 0"
                )));
            }
            let family = BusFamily::of(spec.kind);
            let start_index = match family {
                BusFamily::Sata => sata_index,
                BusFamily::Scsi => scsi_index,
                BusFamily::Nvme => nvme_index,
            };
            let drive_count = u32::try_from(spec.drives.len()).map_err(|_| {
                TopologyError::Invalid(format!("controller #{spec_index}: too many drives"))
            })?;
            let instances = drive_count.div_ceil(spec.max_drives);

            let pci_bus = if spec.behind_pci_bridge {
                Some(
                    attachable_buses
                        .next()
                        .ok_or(TopologyError::NoAttachableBus { index: spec_index })?,
                )
            } else {
                None
            };

            let mut drives = Vec::with_capacity(spec.drives.len());
            for (i, drive) in spec.drives.iter().enumerate() {
                let i = u32::try_from(i).unwrap_or(u32::MAX);
                let bus = start_index + i / spec.max_drives;
                let unit = i % spec.max_drives;
                let id = format!("{}{bus}-{unit}", family.prefix());
                let file = drive
                    .file
                    .clone()
                    .unwrap_or_else(|| workspace.join(format!("{id}.img")));
                drives.push(ResolvedDrive {
                    id,
                    file,
                    size_gib: drive.size_gib,
                    format: drive.format,
                    cache: drive.cache,
                    serial: drive.serial.clone(),
                    wwn: drive.wwn,
                    bus,
                    unit,
                });
            }

            match family {
                BusFamily::Sata => sata_index += instances,
                BusFamily::Scsi => scsi_index += instances,
                BusFamily::Nvme => nvme_index += instances,
            }
            controllers.push(ResolvedController {
                kind: spec.kind,
                start_index,
                instances,
                pci_bus,
                drives,
            });
        }
        Ok(StorageTopology { controllers })
    }

    #[must_use]
    pub fn controllers(&self) -> &[ResolvedController] {
        &self.controllers
    }

    /// Create any missing backing files.
    ///
    /// Files that already exist are reused unchanged — a restart must never
    /// truncate or recreate pre-existing drive data.  Raw images are created
    /// sparse; qcow2 images go through `qemu-img`.
    pub fn ensure_backing_files(&self) -> TopologyResult<()> {
        for controller in &self.controllers {
            for drive in &controller.drives {
                if drive.file.exists() {
                    debug!("backing file {} exists; left untouched", drive.file.display());
                    continue;
                }
                create_image(&drive.file, drive.format, drive.size_gib)?;
                info!(
                    "created {} backing file {} ({} GiB)",
                    drive.format,
                    drive.file.display(),
                    drive.size_gib
                );
            }
        }
        Ok(())
    }
}

fn create_image(path: &Path, format: DiskFormat, size_gib: u32) -> TopologyResult<()> {
    match format {
        DiskFormat::Raw => {
            let file = std::fs::File::create_new(path).map_err(|source| {
                TopologyError::BackingFile {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            file.set_len(u64::from(size_gib) * GIB)
                .map_err(|source| TopologyError::BackingFile {
                    path: path.to_path_buf(),
                    source,
                })
        }
        DiskFormat::Qcow2 => {
            let output = Command::new("qemu-img")
                .args(["create", "-f", "qcow2"])
                .arg(path)
                .arg(format!("{size_gib}G"))
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .map_err(|source| TopologyError::BackingFile {
                    path: path.to_path_buf(),
                    source,
                })?;
            if !output.status.success() {
                return Err(TopologyError::ImageTool {
                    path: path.to_path_buf(),
                    detail: format!(
                        "status: {}, stderr: {}",
                        output.status,
                        String::from_utf8_lossy(&output.stderr)
                    ),
                });
            }
            Ok(())
        }
    }
}

impl Element for StorageTopology {
    fn validate(&self) -> TopologyResult<()> {
        for controller in &self.controllers {
            if controller.kind == ControllerKind::Nvme {
                for drive in &controller.drives {
                    // NVMe serials are synthesized during normalization;
                    // missing here means normalization was skipped.
                    if drive.serial.is_none() {
                        return Err(TopologyError::Invalid(format!(
                            "nvme drive {} has no serial",
                            drive.id
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn render(&self, cmd: &mut CmdLine) -> TopologyResult<()> {
        for controller in &self.controllers {
            let family = BusFamily::of(controller.kind);
            // Host-side drive options.
            for drive in &controller.drives {
                let mut value = format!(
                    "file={},if=none,id={}-drive,format={},cache={}",
                    drive.file.display(),
                    drive.id,
                    drive.format,
                    drive.cache
                );
                if let Some(serial) = &drive.serial {
                    value.push_str(&format!(",serial={serial}"));
                }
                if let Some(wwn) = drive.wwn {
                    value.push_str(&format!(",wwn=0x{wwn:016x}"));
                }
                cmd.opt("-drive", value);
            }
            // Device-side drive options.
            for drive in &controller.drives {
                let value = match family {
                    BusFamily::Sata => format!(
                        "ide-hd,drive={}-drive,bus=sata{}.{}",
                        drive.id, drive.bus, drive.unit
                    ),
                    BusFamily::Scsi => format!(
                        "scsi-hd,drive={}-drive,bus=scsi{}.0,scsi-id={}",
                        drive.id, drive.bus, drive.unit
                    ),
                    BusFamily::Nvme => format!(
                        "nvme-ns,drive={}-drive,bus=nvme{}",
                        drive.id, drive.bus
                    ),
                };
                cmd.opt("-device", value);
            }
            // Controller devices, one per instance.
            for instance in 0..controller.instances {
                let bus = controller.start_index + instance;
                let mut value = format!(
                    "{},id={}{bus}",
                    controller_model(controller.kind),
                    family.prefix()
                );
                if controller.kind == ControllerKind::Nvme {
                    // The controller serial is the serial of the first
                    // namespace on that instance.
                    if let Some(drive) = controller.drives.iter().find(|d| d.bus == bus) {
                        if let Some(serial) = &drive.serial {
                            value.push_str(&format!(",serial={serial}"));
                        }
                    }
                }
                if let Some(pci_bus) = controller.pci_bus {
                    value.push_str(&format!(",bus=pci_bridge_{pci_bus}"));
                }
                cmd.opt("-device", value);
            }
        }
        Ok(())
    }
}
