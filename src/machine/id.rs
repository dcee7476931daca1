// file: src/machine/id.rs
// version: 1.0.0
// guid: 0f907293-7b8e-41ea-b9b6-486bd4390372

//! External machine reference in `<node-name>/<machine-uuid>` form

use crate::error::FleetError;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The unique external reference to a machine
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MachineId {
    pub node: String,
    pub uuid: Uuid,
}

impl MachineId {
    pub fn new(node: impl Into<String>, uuid: Uuid) -> Self {
        Self {
            node: node.into(),
            uuid,
        }
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.uuid)
    }
}

impl FromStr for MachineId {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        let [node, uuid] = parts.as_slice() else {
            return Err(FleetError::invalid_id(format!(
                "'{}' is not of the form <node>/<uuid>",
                s
            )));
        };

        if node.is_empty() {
            return Err(FleetError::invalid_id(format!("'{}' has an empty node name", s)));
        }

        let uuid = Uuid::parse_str(uuid)
            .map_err(|e| FleetError::invalid_id(format!("'{}': {}", s, e)))?;

        Ok(Self::new(*node, uuid))
    }
}
