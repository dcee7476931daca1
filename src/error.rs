// file: src/error.rs
// version: 3.0.0
// guid: 57b83a63-07b6-4534-aa6c-51e8797254e0

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the agent
pub type Result<T> = std::result::Result<T, FleetError>;

/// Error types for fleet machine management
#[derive(Error, Debug)]
pub enum FleetError {
    /// Dial, handshake or authentication against a node failed
    #[error("Connection to node '{node}' failed: {message}")]
    Connection { node: String, message: String },

    /// Credential material could not be loaded or parsed
    #[error("Credential error ({}): {message}", path.display())]
    Credential { path: PathBuf, message: String },

    /// A remote tool exited with a non-zero status
    #[error("Remote command '{command}' on node '{node}' failed (exit code {exit_code}): {stderr}")]
    RemoteCommand {
        node: String,
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// Structured output did not decode into the expected shape
    #[error("Malformed response from '{command}': {message}\n{raw}")]
    MalformedResponse {
        command: String,
        message: String,
        raw: String,
    },

    /// Text output did not contain exactly one expected success marker
    #[error("Unrecognized response from '{command}': {raw}")]
    UnrecognizedResponse { command: String, raw: String },

    /// Image lookup exhausted both the local and remote catalogs
    #[error("Image {reference} not found on node '{node}' or in its remote catalog")]
    ImageNotFound { node: String, reference: String },

    /// A precondition failed before any remote call was made
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The per-command deadline elapsed
    #[error("Command '{command}' on node '{node}' timed out")]
    Timeout { node: String, command: String },

    #[error("Invalid machine id: {0}")]
    InvalidId(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl FleetError {
    /// Create a new configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new connection error
    pub fn connection(node: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Connection {
            node: node.into(),
            message: msg.into(),
        }
    }

    /// Create a new credential error
    pub fn credential(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Credential {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a new invalid id error
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// True when the failure happened before any node was contacted
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::Credential { .. }
                | Self::InvalidId(_)
                | Self::Yaml(_)
                | Self::Toml(_)
        )
    }
}
