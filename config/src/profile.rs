// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Hardware profiles.
//!
//! A profile selects the BMC emulation data shipped with the simulator and
//! decides whether the node gets a management-console task.  The set is
//! deliberately closed: adding a profile means shipping its emulation data.

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HardwareProfile {
    /// Plain KCS-over-LAN BMC with no vendor-specific console.
    #[default]
    Generic,
    /// Dell PowerEdge R730; requires the vendor management console.
    DellR730,
    /// Quanta D51; requires the vendor management console.
    QuantaD51,
}

impl HardwareProfile {
    /// Whether this profile ships a vendor management console that must be
    /// supervised alongside the BMC.
    #[must_use]
    pub fn needs_console(&self) -> bool {
        match self {
            HardwareProfile::Generic => false,
            HardwareProfile::DellR730 | HardwareProfile::QuantaD51 => true,
        }
    }

    /// Basename of the BMC emulation data for this profile.
    #[must_use]
    pub fn emulation_data(&self) -> &'static str {
        match self {
            HardwareProfile::Generic => "generic.emu",
            HardwareProfile::DellR730 => "dell_r730.emu",
            HardwareProfile::QuantaD51 => "quanta_d51.emu",
        }
    }
}
