// file: src/cli/commands.rs
// version: 2.0.0
// guid: g7h8i9j0-k1l2-3456-7890-123456ghijkl

//! Command implementations for the CLI

use crate::{
    config::{ConfigLoader, ProviderConfig},
    error::FleetError,
    machine::{machine_schema, ConnectionInfo, Machine, MachineId},
    network::{NodePool, SshRunner},
    orchestrator::MachineOrchestrator,
    reconcile::plan_update,
    Result,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Loaded configuration plus the connection pool shared by remote commands
pub struct FleetContext {
    pub config: ProviderConfig,
    pub pool: Arc<NodePool>,
    pub orchestrator: MachineOrchestrator,
    loader: ConfigLoader,
}

impl FleetContext {
    /// Load the provider configuration from `path` or the default location
    pub fn open(path: Option<PathBuf>) -> Result<Self> {
        let path = path
            .or_else(ConfigLoader::default_config_path)
            .ok_or_else(|| FleetError::configuration("No configuration path available"))?;

        let loader = ConfigLoader::new();
        let config = loader.load_provider_config(&path)?;
        let pool = Arc::new(NodePool::new(config.clone())?);
        let runner = Arc::new(SshRunner::new(Arc::clone(&pool)));
        let orchestrator = MachineOrchestrator::new(runner)
            .with_metadata_prefix(config.scoped_metadata_prefix.clone());

        Ok(Self {
            config,
            pool,
            orchestrator,
            loader,
        })
    }

    fn declared_machine(&self, path: &Path) -> Result<Machine> {
        let declaration = self.loader.load_declaration(path)?;
        declaration.validate(&self.config)?;
        Ok(declaration.into_machine())
    }
}

/// Operator-facing view of a machine
#[derive(Serialize)]
struct MachineView<'a> {
    id: Option<String>,
    node_name: &'a str,
    state: &'a str,
    primary_ip: &'a str,
    metadata: &'a BTreeMap<String, String>,
    connection: Option<ConnectionInfo>,
    #[serde(flatten)]
    machine: &'a Machine,
}

impl<'a> MachineView<'a> {
    fn new(machine: &'a Machine) -> Self {
        Self {
            id: machine
                .id
                .map(|id| MachineId::new(machine.node_name.as_str(), id).to_string()),
            node_name: &machine.node_name,
            state: &machine.state,
            primary_ip: &machine.primary_ip,
            metadata: &machine.metadata,
            connection: machine.connection_info(),
            machine,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Create a machine from a declaration file
pub async fn create_command(ctx: &FleetContext, declaration: &Path) -> Result<()> {
    let machine = ctx.declared_machine(declaration)?;
    info!("Creating '{}' on {}", machine.alias, machine.node_name);

    let created = ctx.orchestrator.create(&machine).await?;
    print_json(&MachineView::new(&created))
}

/// Show one machine
pub async fn get_command(ctx: &FleetContext, id: &str) -> Result<()> {
    let id: MachineId = id.parse()?;
    let machine = ctx.orchestrator.read(&id.node, id.uuid).await?;
    print_json(&MachineView::new(&machine))
}

/// Reconcile two declarations and apply the in-place changes
pub async fn update_command(
    ctx: &FleetContext,
    id: &str,
    previous: &Path,
    desired: &Path,
) -> Result<()> {
    let id: MachineId = id.parse()?;
    let previous = ctx.declared_machine(previous)?;
    let desired = ctx.declared_machine(desired)?;

    if desired.node_name != id.node {
        return Err(FleetError::configuration(format!(
            "Declaration targets node '{}' but machine lives on '{}'",
            desired.node_name, id.node
        )));
    }

    let plan = plan_update(&previous, &desired);
    match ctx.orchestrator.update(&id.node, id.uuid, &plan).await? {
        Some(machine) => print_json(&MachineView::new(&machine)),
        None => {
            info!("{} is up to date", id);
            Ok(())
        }
    }
}

/// Delete a machine
pub async fn delete_command(ctx: &FleetContext, id: &str) -> Result<()> {
    let id: MachineId = id.parse()?;
    ctx.orchestrator.delete(&id.node, id.uuid).await?;
    info!("Deleted {}", id);
    Ok(())
}

/// Resolve an image by name and version
pub async fn image_command(
    ctx: &FleetContext,
    node: &str,
    name: &str,
    version: &str,
    no_import: bool,
) -> Result<()> {
    if !ctx.config.has_node(node) {
        return Err(FleetError::configuration(format!("Unknown node '{}'", node)));
    }

    let images = ctx.orchestrator.images();
    let image = if no_import {
        images.lookup(node, name, version).await?
    } else {
        images.resolve(node, name, version).await?
    };
    print_json(&image)
}

#[derive(Serialize)]
struct PlanView<'a> {
    payload: &'a Machine,
    changed: Vec<&'static str>,
    force_new: Vec<&'static str>,
}

/// Show the update two declarations would produce, without connecting
pub fn plan_command(previous: &Path, desired: &Path) -> Result<()> {
    let loader = ConfigLoader::new();
    let previous = loader.load_declaration(previous)?.into_machine();
    let desired = loader.load_declaration(desired)?.into_machine();

    let plan = plan_update(&previous, &desired);
    print_json(&PlanView {
        payload: &plan.payload,
        changed: plan.changed().iter().map(|a| a.name()).collect(),
        force_new: plan.force_new.iter().map(|a| a.name()).collect(),
    })
}

/// Print the attribute table
pub fn schema_command() -> Result<()> {
    print_json(&machine_schema())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn declaration(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_plan_command_reads_both_declarations() {
        let previous = declaration("node_name: node-a\nalias: web-1\nbrand: joyent\n");
        let desired = declaration("node_name: node-a\nalias: web-2\nbrand: joyent\n");

        assert!(plan_command(previous.path(), desired.path()).is_ok());
    }

    #[test]
    fn test_plan_command_missing_file() {
        let result = plan_command(Path::new("/nonexistent/old.yaml"), Path::new("/nonexistent/new.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_machine_view_includes_reference() {
        let mut machine = Machine::new("node-a");
        machine.id = Some(uuid::Uuid::nil());
        machine.primary_ip = "10.0.0.5".to_string();

        let value = serde_json::to_value(MachineView::new(&machine)).unwrap();

        assert_eq!(value["id"], "node-a/00000000-0000-0000-0000-000000000000");
        assert_eq!(value["connection"]["type"], "ssh");
        assert_eq!(value["connection"]["host"], "10.0.0.5");
    }
}
