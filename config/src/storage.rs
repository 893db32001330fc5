// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Node configuration model: storage controllers and drives

use crate::{ConfigError, ConfigResult};
use std::path::PathBuf;

/// Storage controller family.
///
/// AHCI exposes SATA buses; SAS and MegaRAID both expose SCSI buses and
/// share a numbering space distinct from AHCI.  NVMe controllers carry
/// their namespaces directly and require a serial number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ControllerKind {
    Ahci,
    Sas,
    Megaraid,
    Nvme,
}

/// On-disk image format of a drive's backing file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiskFormat {
    #[default]
    Qcow2,
    Raw,
}

/// Host page-cache mode for a drive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CacheMode {
    #[default]
    Writeback,
    Writethrough,
    None,
    Unsafe,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DriveConfig {
    /// Drive capacity in GiB; used only when the backing file is created.
    pub size_gib: u32,
    /// Backing file path.  When absent a file is created under the node
    /// workspace; when present and existing, the file is reused unchanged.
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub format: DiskFormat,
    #[serde(default)]
    pub cache: CacheMode,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub wwn: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ControllerConfig {
    #[serde(rename = "type")]
    pub kind: ControllerKind,
    /// Drives per controller instance; extra drives split onto further
    /// instances with consecutive bus numbers.
    #[serde(default = "default_max_drives")]
    pub max_drives: u32,
    /// Place this controller behind an attachable PCI bridge bus.
    #[serde(default)]
    pub behind_pci_bridge: bool,
    #[serde(default)]
    pub drives: Vec<DriveConfig>,
}

fn default_max_drives() -> u32 {
    6
}

impl ControllerConfig {
    pub fn validate(&self) -> ConfigResult {
        if self.max_drives == 0 {
            return Err(ConfigError::InvalidValue {
                field: "storage.max_drives",
                reason: "must be at least 1".to_string(),
            });
        }
        for drive in &self.drives {
            if drive.size_gib == 0 && drive.file.is_none() {
                return Err(ConfigError::InvalidValue {
                    field: "storage.drives.size_gib",
                    reason: "a drive without a backing file needs a non-zero size".to_string(),
                });
            }
        }
        Ok(())
    }
}
