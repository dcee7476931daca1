// file: src/orchestrator/mod.rs
// version: 1.1.0
// guid: 0d0f403f-d36b-499e-9c38-0304b05594a4

//! Machine lifecycle operations
//!
//! Each operation sequences image resolution, remote commands and response
//! parsing. Operations on one machine are serialized; create and image
//! imports are serialized per node.

pub mod lifecycle;
pub mod locks;

pub use lifecycle::LifecycleState;
pub use locks::MachineLocks;

use crate::error::{FleetError, Result};
use crate::image::ImageResolver;
use crate::logging::with_async_operation_span;
use crate::machine::{Machine, MachineId, SCOPED_METADATA_PREFIX};
use crate::network::CommandRunner;
use crate::parser::{decode_machine, MarkerMatcher, ResponseMatcher};
use crate::protocol::RemoteCommand;
use crate::reconcile::UpdatePlan;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct MachineOrchestrator {
    runner: Arc<dyn CommandRunner>,
    images: ImageResolver,
    locks: MachineLocks,
    metadata_prefix: String,
}

impl MachineOrchestrator {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            images: ImageResolver::new(Arc::clone(&runner)),
            runner,
            locks: MachineLocks::new(),
            metadata_prefix: SCOPED_METADATA_PREFIX.to_string(),
        }
    }

    /// Use a different namespace for the scoped metadata view
    pub fn with_metadata_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.metadata_prefix = prefix.into();
        self
    }

    pub fn images(&self) -> &ImageResolver {
        &self.images
    }

    /// Create `machine` on its node and return the node's view of it
    pub async fn create(&self, machine: &Machine) -> Result<Machine> {
        let node = machine.node_name.clone();
        with_async_operation_span("create", &node, || async {
            let state = LifecycleState::Absent.transition(LifecycleState::Creating)?;
            let result = self.create_machine(machine).await;
            log_outcome(&node, state, &result);
            result
        })
        .await
    }

    async fn create_machine(&self, machine: &Machine) -> Result<Machine> {
        let node = machine.node_name.as_str();
        check_creatable(machine)?;

        let id = {
            let _node_guard = self.locks.node(node).await;

            for image in machine.referenced_images() {
                self.images.ensure_imported(node, image).await?;
            }

            let mut declared = machine.clone();
            declared.id = None;
            let payload = serde_json::to_vec(&declared)?;

            let command = RemoteCommand::CreateMachine.command_line();
            let output = self.runner.run(node, &command, &payload).await?;
            MarkerMatcher::created()?.extract(&command, &output.combined_text())?
        };

        info!("Created machine {}/{}", node, id);
        let _guard = self.locks.machine(node, id).await;
        self.fetch(node, id).await
    }

    /// Fetch the node's authoritative view of one machine
    pub async fn read(&self, node: &str, id: Uuid) -> Result<Machine> {
        let target = MachineId::new(node, id).to_string();
        with_async_operation_span("read", &target, || async {
            let _guard = self.locks.machine(node, id).await;
            self.fetch(node, id).await
        })
        .await
    }

    async fn fetch(&self, node: &str, id: Uuid) -> Result<Machine> {
        let command = RemoteCommand::GetMachine(id).command_line();
        let output = self.runner.run(node, &command, &[]).await?;
        debug!("Returned data: {}", output.stdout_lossy());

        let mut machine = decode_machine(&command, &output.stdout)?;
        if machine.id.is_none() {
            machine.id = Some(id);
        }
        machine.node_name = node.to_string();
        machine.refresh_derived(&self.metadata_prefix);
        Ok(machine)
    }

    /// Apply `plan` and return the refreshed machine.
    ///
    /// Returns `None` without contacting the node when the plan changes nothing.
    pub async fn update(&self, node: &str, id: Uuid, plan: &UpdatePlan) -> Result<Option<Machine>> {
        if plan.requires_recreation() {
            let names: Vec<&str> = plan.force_new.iter().map(|a| a.name()).collect();
            return Err(FleetError::configuration(format!(
                "Changing {} requires recreating {}/{}",
                names.join(", "),
                node,
                id
            )));
        }
        if plan.is_empty() {
            debug!("No in-place changes for {}/{}", node, id);
            return Ok(None);
        }

        let target = MachineId::new(node, id).to_string();
        with_async_operation_span("update", &target, || async {
            let state = LifecycleState::Present.transition(LifecycleState::Updating)?;
            let _guard = self.locks.machine(node, id).await;

            let result: Result<Machine> = async {
                let mut payload = plan.payload.clone();
                payload.id = None;
                let bytes = serde_json::to_vec(&payload)?;

                let command = RemoteCommand::UpdateMachine(id).command_line();
                self.runner.run(node, &command, &bytes).await?;
                self.fetch(node, id).await
            }
            .await;

            log_outcome(node, state, &result);
            result.map(Some)
        })
        .await
    }

    /// Delete one machine; the node must confirm the same identifier
    pub async fn delete(&self, node: &str, id: Uuid) -> Result<()> {
        let target = MachineId::new(node, id).to_string();
        with_async_operation_span("delete", &target, || async {
            let state = LifecycleState::Present.transition(LifecycleState::Deleting)?;
            let _guard = self.locks.machine(node, id).await;

            let result: Result<()> = async {
                let command = RemoteCommand::DeleteMachine(id).command_line();
                let output = self.runner.run(node, &command, &[]).await?;
                let text = output.combined_text();
                let deleted = MarkerMatcher::deleted()?.extract(&command, &text)?;

                if deleted != id {
                    return Err(FleetError::UnrecognizedResponse { command, raw: text });
                }
                Ok(())
            }
            .await;

            match &result {
                Ok(()) => info!("Machine {} {} -> {}", target, state, LifecycleState::Absent),
                Err(e) => warn!("Machine {} {} -> {}: {}", target, state, LifecycleState::Failed, e),
            }

            result
        })
        .await
    }
}

/// Checks that need no remote call
fn check_creatable(machine: &Machine) -> Result<()> {
    if machine.node_name.is_empty() {
        return Err(FleetError::configuration("Machine has no node_name"));
    }
    if machine.is_os_virtualized() && machine.base_image().is_none() {
        return Err(FleetError::configuration(format!(
            "Brand '{}' requires an image_uuid",
            machine.brand
        )));
    }
    Ok(())
}

fn log_outcome(target: &str, state: LifecycleState, result: &Result<Machine>) {
    match result {
        Ok(machine) => info!(
            "Machine {} {} -> {}",
            machine
                .id
                .map(|id| MachineId::new(target, id).to_string())
                .unwrap_or_else(|| target.to_string()),
            state,
            LifecycleState::Present
        ),
        Err(e) => warn!("Machine {} {} -> {}: {}", target, state, LifecycleState::Failed, e),
    }
}
