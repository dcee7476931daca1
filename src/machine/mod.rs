// file: src/machine/mod.rs
// version: 1.0.0
// guid: 09cc4ccb-f2cb-4832-b5ee-e380af2d94fd

//! Machine model: entities, external identifiers and attribute metadata

pub mod id;
pub mod model;
pub mod schema;

pub use id::MachineId;
pub use model::{
    ConnectionInfo, Disk, Machine, NetworkInterface, OS_VIRTUALIZED_BRANDS,
    SCOPED_METADATA_PREFIX,
};
pub use schema::{machine_schema, Attribute, AttributeSpec, Mutability};
