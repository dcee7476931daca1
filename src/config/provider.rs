// file: src/config/provider.rs
// version: 1.0.0
// guid: 768f2814-82ab-4e5b-9959-10a74f08ec8b

//! Fleet connection settings

use crate::error::{FleetError, Result};
use crate::machine::SCOPED_METADATA_PREFIX;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// How to reach and authenticate against every node in the fleet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Node name to network address (host or host:port)
    pub hosts: BTreeMap<String, String>,
    /// Login user on every node
    pub user: String,
    /// Private key file; `~` and `${VAR}` are expanded
    #[serde(default)]
    pub private_key: Option<PathBuf>,
    #[serde(default)]
    pub private_key_passphrase: Option<String>,
    /// Try the agent at `SSH_AUTH_SOCK` before the key file
    #[serde(default = "default_use_agent")]
    pub use_agent: bool,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Unset means commands may run indefinitely
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
    /// Verify node host keys against `known_hosts`
    #[serde(default)]
    pub strict_host_key_checking: bool,
    #[serde(default)]
    pub known_hosts: Option<PathBuf>,
    #[serde(default = "default_prefix")]
    pub scoped_metadata_prefix: String,
}

fn default_use_agent() -> bool {
    true
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_prefix() -> String {
    SCOPED_METADATA_PREFIX.to_string()
}

impl ProviderConfig {
    /// Minimal config for the given hosts and user, everything else defaulted
    pub fn new(hosts: BTreeMap<String, String>, user: impl Into<String>) -> Self {
        Self {
            hosts,
            user: user.into(),
            private_key: None,
            private_key_passphrase: None,
            use_agent: default_use_agent(),
            port: default_port(),
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: None,
            strict_host_key_checking: false,
            known_hosts: None,
            scoped_metadata_prefix: default_prefix(),
        }
    }

    /// Validate the provider configuration
    pub fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(FleetError::configuration("At least one host must be configured"));
        }

        for (node, address) in &self.hosts {
            if node.is_empty() || node.contains('/') {
                return Err(FleetError::configuration(format!(
                    "Invalid node name '{}'",
                    node
                )));
            }
            if address.trim().is_empty() {
                return Err(FleetError::configuration(format!(
                    "Node '{}' has an empty address",
                    node
                )));
            }
        }

        if self.user.is_empty() {
            return Err(FleetError::configuration("User cannot be empty"));
        }

        if self.connect_timeout_secs == 0 {
            return Err(FleetError::configuration(
                "connect_timeout_secs must be greater than zero",
            ));
        }

        if self.command_timeout_secs == Some(0) {
            return Err(FleetError::configuration(
                "command_timeout_secs must be greater than zero when set",
            ));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(user) = std::env::var("SMARTOS_FLEET_USER") {
            self.user = user;
        }

        if let Ok(key) = std::env::var("SMARTOS_FLEET_PRIVATE_KEY") {
            self.private_key = Some(PathBuf::from(key));
        }

        if let Ok(timeout) = std::env::var("SMARTOS_FLEET_COMMAND_TIMEOUT") {
            if let Ok(timeout_secs) = timeout.parse::<u64>() {
                self.command_timeout_secs = Some(timeout_secs);
            }
        }

        self
    }

    /// Whether `node` is part of the fleet
    pub fn has_node(&self, node: &str) -> bool {
        self.hosts.contains_key(node)
    }

    /// Resolve the socket address of a node
    pub fn socket_addr(&self, node: &str) -> Result<SocketAddr> {
        let address = self
            .hosts
            .get(node)
            .ok_or_else(|| FleetError::configuration(format!("Unknown node '{}'", node)))?;

        let candidate = if address.parse::<SocketAddr>().is_ok() || has_port(address) {
            address.clone()
        } else {
            format!("{}:{}", address, self.port)
        };

        debug!("Resolving {} for node {}", candidate, node);
        candidate
            .to_socket_addrs()
            .map_err(|e| FleetError::connection(node, format!("Cannot resolve {}: {}", candidate, e)))?
            .next()
            .ok_or_else(|| FleetError::connection(node, format!("No address for {}", candidate)))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}

fn has_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => !host.contains(':') && port.parse::<u16>().is_ok(),
        None => false,
    }
}
