// file: src/protocol.rs
// version: 1.0.0
// guid: 146a679f-13c6-4fa3-a7a9-2cd0b4a7e2b4

//! Remote command lines understood by the node's management tools

use crate::error::{FleetError, Result};
use regex::Regex;
use std::fmt;
use uuid::Uuid;

/// Name/version pair used to filter image catalogs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageQuery {
    name: String,
    version: String,
}

impl ImageQuery {
    /// Build a query, rejecting values that are unsafe to pass on a shell command line
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let version = version.into();

        let re = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._+-]*$")
            .map_err(|e| FleetError::configuration(format!("Invalid regex pattern: {}", e)))?;

        for (field, value) in [("name", &name), ("version", &version)] {
            if !re.is_match(value) {
                return Err(FleetError::configuration(format!(
                    "Image {} '{}' contains unsupported characters",
                    field, value
                )));
            }
        }

        Ok(Self { name, version })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for ImageQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// A single invocation of `vmadm` or `imgadm`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    /// Payload on stdin
    CreateMachine,
    GetMachine(Uuid),
    /// Payload on stdin
    UpdateMachine(Uuid),
    DeleteMachine(Uuid),
    LocalImages(ImageQuery),
    LocalImageById(Uuid),
    AvailableImages(ImageQuery),
    AvailableImageById(Uuid),
    ImportImage(Uuid),
}

impl RemoteCommand {
    pub fn command_line(&self) -> String {
        match self {
            RemoteCommand::CreateMachine => "vmadm create".to_string(),
            RemoteCommand::GetMachine(id) => format!("vmadm get {}", id),
            RemoteCommand::UpdateMachine(id) => format!("vmadm update {}", id),
            RemoteCommand::DeleteMachine(id) => format!("vmadm delete {}", id),
            RemoteCommand::LocalImages(q) => {
                format!("imgadm list -j name={} version={}", q.name, q.version)
            }
            RemoteCommand::LocalImageById(id) => format!("imgadm list -j uuid={}", id),
            RemoteCommand::AvailableImages(q) => {
                format!("imgadm avail -j name={} version={}", q.name, q.version)
            }
            RemoteCommand::AvailableImageById(id) => format!("imgadm avail -j uuid={}", id),
            RemoteCommand::ImportImage(id) => format!("imgadm import {}", id),
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}
