// file: src/network/executor.rs
// version: 2.1.0
// guid: exec0001-2345-6789-abcd-ef0123456789

//! Command execution trait for remote node commands

use super::pool::NodePool;
use super::ssh::CommandOutput;
use crate::error::FleetError;
use crate::Result;
use std::sync::Arc;
use tracing::debug;

/// Runs one command on a node and returns its captured output
///
/// Implementations must fail with `RemoteCommand` when the command exits
/// non-zero, so callers only ever see successful output.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Execute `command` on `node`, feeding `input` to its stdin when non-empty
    async fn run(&self, node: &str, command: &str, input: &[u8]) -> Result<CommandOutput>;
}

/// Executes commands over the pooled SSH sessions
pub struct SshRunner {
    pool: Arc<NodePool>,
}

impl SshRunner {
    pub fn new(pool: Arc<NodePool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<NodePool> {
        &self.pool
    }
}

#[async_trait::async_trait]
impl CommandRunner for SshRunner {
    async fn run(&self, node: &str, command: &str, input: &[u8]) -> Result<CommandOutput> {
        let session = self.pool.connect(node).await?;

        if !input.is_empty() {
            debug!("STDIN: {}", String::from_utf8_lossy(input));
        }

        let owned_command = command.to_string();
        let owned_input = input.to_vec();
        let result = tokio::task::spawn_blocking(move || session.run(&owned_command, &owned_input))
            .await
            .map_err(|e| FleetError::connection(node, format!("command task failed: {}", e)))?;

        match result {
            Ok(output) => output.into_result(node, command),
            Err(err) => {
                if breaks_session(&err) {
                    self.pool.evict(node).await;
                }
                Err(err)
            }
        }
    }
}

/// The session state is unknown after a transport failure or timeout
fn breaks_session(err: &FleetError) -> bool {
    matches!(err, FleetError::Connection { .. } | FleetError::Timeout { .. })
}
