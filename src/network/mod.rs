// file: src/network/mod.rs
// version: 2.0.0
// guid: s9t0u1v2-w3x4-5678-9012-345678stuvwx

//! Node connections and remote command execution

pub mod credentials;
pub mod executor;
pub mod pool;
pub mod ssh;

pub use credentials::{Credential, CredentialLoader};
pub use executor::{CommandRunner, SshRunner};
pub use pool::NodePool;
pub use ssh::{CommandOutput, NodeSession};
