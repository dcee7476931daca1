// file: src/config/declaration.rs
// version: 1.0.0
// guid: 7ba5f503-1b18-4323-9fd0-81104537bcf4

//! Declared machine configuration files

use super::ProviderConfig;
use crate::error::{FleetError, Result};
use crate::machine::Machine;
use serde::{Deserialize, Serialize};

/// A machine as declared by an operator
///
/// ```yaml
/// node_name: node-a
/// alias: web01
/// brand: joyent
/// image_uuid: 1d05e788-5409-11eb-b12f-037bd7fee4ee
/// max_physical_memory: 512
/// customer_metadata:
///   role: web
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineDeclaration {
    pub node_name: String,
    #[serde(flatten)]
    pub machine: Machine,
}

impl MachineDeclaration {
    /// Validate the declaration against the configured fleet
    pub fn validate(&self, provider: &ProviderConfig) -> Result<()> {
        if !provider.has_node(&self.node_name) {
            return Err(FleetError::configuration(format!(
                "Node '{}' is not configured in hosts",
                self.node_name
            )));
        }

        if self.machine.alias.is_empty() {
            return Err(FleetError::configuration("Alias cannot be empty"));
        }

        if self.machine.brand.is_empty() {
            return Err(FleetError::configuration("Brand cannot be empty"));
        }

        if self.machine.id.is_some() {
            return Err(FleetError::configuration(
                "uuid is assigned by the node and cannot be declared",
            ));
        }

        for (index, nic) in self.machine.network_interfaces.iter().enumerate() {
            if nic.vrrp_vrid == Some(0) {
                return Err(FleetError::configuration(format!(
                    "nics[{}]: vrrp_vrid must be between 1 and 255",
                    index
                )));
            }
        }

        Ok(())
    }

    /// The declared machine, owned by its node
    pub fn into_machine(self) -> Machine {
        let mut machine = self.machine;
        machine.node_name = self.node_name;
        machine
    }
}
