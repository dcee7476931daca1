// file: src/config/mod.rs
// version: 2.0.0
// guid: a1b2c3d4-e5f6-7a8b-9c0d-1e2f3a4b5c6d

//! Configuration module for the fleet agent
//!
//! Handles loading and validation of the provider (fleet) configuration and of
//! declared machine files.

pub mod declaration;
pub mod loader;
pub mod provider;

pub use declaration::MachineDeclaration;
pub use loader::ConfigLoader;
pub use provider::ProviderConfig;
