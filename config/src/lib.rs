// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Declarative node description model.
//!
//! This crate defines the typed configuration a node is built from: the
//! compute section (CPU, memory, networks, storage, PCI bridges), the BMC
//! section, and the optional monitor section.  The model is deserialized
//! from YAML by the CLI; the library crates only ever see the typed form.
//!
//! Two operations matter beyond plain deserialization:
//!
//! - [`NodeConfig::validate`]: fail-fast checks for required fields and
//!   numeric ranges, surfaced as [`ConfigError`] before any process is
//!   launched.
//! - [`NodeConfig::normalize`]: fills the few fields the model synthesizes
//!   when absent (MAC addresses for bridge-mode interfaces, serial numbers
//!   for NVMe storage entries).  Required fields are never defaulted here.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod compute;
pub mod mac;
pub mod network;
pub mod node;
pub mod pci;
pub mod profile;
pub mod storage;

pub use mac::Mac;
pub use node::{BmcSection, MonitorSection, NodeConfig, NodeConfigBuilder};
pub use profile::HardwareProfile;

/// Errors raised while validating a node description.
///
/// These are "your description is wrong" errors: they are always detected before
/// any process is launched and are distinct from environment errors raised
/// by prechecks.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("node has no compute section or compute section is empty")]
    EmptyCompute,
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("bad MAC address '{0}'")]
    BadMac(String),
}

/// Alias for results of config validation.
pub type ConfigResult = Result<(), ConfigError>;
