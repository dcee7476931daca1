// file: src/orchestrator/locks.rs
// version: 1.1.0
// guid: 20e9b0e4-dfbc-47ee-b66e-f96edcd625e8

//! Serialize operations on the same machine or node

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Default)]
pub struct MachineLocks {
    machines: Mutex<HashMap<(String, Uuid), Arc<Mutex<()>>>>,
    nodes: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MachineLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive access to one machine
    pub async fn machine(&self, node: &str, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut machines = self.machines.lock().await;
            // Holders and waiters keep a clone; an entry nobody references is idle.
            // Clones are only made under the map lock, so dropping idle entries here is safe.
            machines.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(machines.entry((node.to_string(), id)).or_default())
        };
        lock.lock_owned().await
    }

    /// Exclusive access to image import and create on one node
    pub async fn node(&self, node: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut nodes = self.nodes.lock().await;
            Arc::clone(nodes.entry(node.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}
