// file: src/lib.rs
// version: 3.0.0
// guid: d82472d1-7f0f-4eb4-b0a3-6e1547103eb4

//! # SmartOS Fleet Agent
//!
//! Creates, reads, updates and deletes zones and hardware VMs on a fleet of
//! SmartOS nodes over SSH, driving `vmadm` and `imgadm` on each node.

pub mod cli;
pub mod config;
pub mod error;
pub mod image;
pub mod logging;
pub mod machine;
pub mod network;
pub mod orchestrator;
pub mod parser;
pub mod protocol;
pub mod reconcile;

pub use error::{FleetError, Result};

/// Version information for the agent
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
