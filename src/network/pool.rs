// file: src/network/pool.rs
// version: 1.0.0
// guid: 6c0e71e1-5ade-471d-b282-54793dc67b94

//! Per-node connection cache
//!
//! At most one session per node name is cached. Concurrent first-connects to
//! the same node wait on one dial; different nodes connect independently. A
//! failed dial leaves nothing cached so the next call retries.

use super::credentials::{Credential, CredentialLoader};
use super::ssh::NodeSession;
use crate::config::ProviderConfig;
use crate::error::{FleetError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

type Slot = Arc<OnceCell<Arc<NodeSession>>>;

pub struct NodePool {
    config: Arc<ProviderConfig>,
    credentials: Arc<Vec<Credential>>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl NodePool {
    /// Build a pool, loading credentials up front
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let credentials = CredentialLoader::load(&config)?;
        Ok(Self::with_credentials(config, credentials))
    }

    pub fn with_credentials(config: ProviderConfig, credentials: Vec<Credential>) -> Self {
        Self {
            config: Arc::new(config),
            credentials: Arc::new(credentials),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Return the cached session for `node`, connecting on first use
    pub async fn connect(&self, node: &str) -> Result<Arc<NodeSession>> {
        if !self.config.has_node(node) {
            return Err(FleetError::configuration(format!("Unknown node '{}'", node)));
        }

        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(node.to_string()).or_default().clone()
        };

        let session = slot
            .get_or_try_init(|| async {
                let owned = node.to_string();
                let config = Arc::clone(&self.config);
                let credentials = Arc::clone(&self.credentials);

                tokio::task::spawn_blocking(move || {
                    NodeSession::connect(&owned, &config, &credentials).map(Arc::new)
                })
                .await
                .map_err(|e| FleetError::connection(node, format!("connect task failed: {}", e)))?
            })
            .await?;

        Ok(Arc::clone(session))
    }

    /// Drop a session whose transport has failed so the next call reconnects
    pub async fn evict(&self, node: &str) {
        let removed = self.slots.lock().await.remove(node);
        if removed.is_some() {
            debug!("Evicted cached session for {}", node);
        }
    }

    /// Close and forget the session for one node
    pub async fn close(&self, node: &str) {
        let removed = self.slots.lock().await.remove(node);
        if let Some(session) = removed.and_then(|slot| slot.get().cloned()) {
            let _ = tokio::task::spawn_blocking(move || session.disconnect()).await;
        }
    }

    /// Close every cached session
    pub async fn shutdown(&self) {
        let drained: Vec<Slot> = self.slots.lock().await.drain().map(|(_, slot)| slot).collect();

        for session in drained.iter().filter_map(|slot| slot.get().cloned()) {
            let _ = tokio::task::spawn_blocking(move || session.disconnect()).await;
        }
        info!("Connection pool shut down");
    }

    /// Nodes that currently hold an established session
    pub async fn connected_nodes(&self) -> Vec<String> {
        let slots = self.slots.lock().await;
        let mut nodes: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(node, _)| node.clone())
            .collect();
        nodes.sort();
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn pool() -> NodePool {
        let mut hosts = BTreeMap::new();
        // Nothing listens on the discard port
        hosts.insert("node-a".to_string(), "127.0.0.1:9".to_string());
        let mut config = ProviderConfig::new(hosts, "root");
        config.connect_timeout_secs = 1;
        NodePool::with_credentials(
            config,
            vec![Credential::Agent {
                socket: PathBuf::from("/tmp/agent.sock"),
            }],
        )
    }

    #[tokio::test]
    async fn test_unknown_node_is_configuration_error() {
        let pool = pool();

        let result = pool.connect("node-z").await;

        assert!(matches!(result, Err(FleetError::Configuration(_))));
        assert!(pool.connected_nodes().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_connect_is_not_cached() {
        let pool = pool();

        let first = pool.connect("node-a").await;
        assert!(matches!(first, Err(FleetError::Connection { .. })));
        assert!(pool.connected_nodes().await.is_empty());

        let second = pool.connect("node-a").await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_on_empty_pool() {
        let pool = pool();
        pool.shutdown().await;
        assert!(pool.connected_nodes().await.is_empty());
    }
}
