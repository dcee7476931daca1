// file: src/machine/schema.rs
// version: 1.0.0
// guid: 30a93096-c290-49a0-9227-72dd8dd04680

//! Attribute metadata for the declarative layer
//!
//! Each machine attribute is tagged with whether it is required, optional or
//! computed, and whether a change can be applied in place or forces the
//! machine to be recreated.

use serde::Serialize;

/// How a change to an attribute is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutability {
    /// Applied with `vmadm update`
    InPlace,
    /// Requires delete + create
    ForceNew,
    /// Reported by the node, never declared
    Computed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Required,
    Optional,
    Computed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Bool,
    Int,
    StringMap,
    StringList,
    DiskList,
    NicList,
}

/// Declared or computed machine attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    NodeName,
    Alias,
    Autoboot,
    Brand,
    CpuCap,
    CustomerMetadata,
    Metadata,
    Disks,
    ImageUuid,
    KernelVersion,
    MaintainResolvers,
    MaxPhysicalMemory,
    Nics,
    PrimaryIp,
    Quota,
    Ram,
    Resolvers,
    Vcpus,
    State,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub kind: ValueKind,
    pub presence: Presence,
    pub mutability: Mutability,
}

impl Attribute {
    pub const ALL: [Attribute; 19] = [
        Attribute::NodeName,
        Attribute::Alias,
        Attribute::Autoboot,
        Attribute::Brand,
        Attribute::CpuCap,
        Attribute::CustomerMetadata,
        Attribute::Metadata,
        Attribute::Disks,
        Attribute::ImageUuid,
        Attribute::KernelVersion,
        Attribute::MaintainResolvers,
        Attribute::MaxPhysicalMemory,
        Attribute::Nics,
        Attribute::PrimaryIp,
        Attribute::Quota,
        Attribute::Ram,
        Attribute::Resolvers,
        Attribute::Vcpus,
        Attribute::State,
    ];

    pub fn spec(self) -> AttributeSpec {
        use Mutability::{Computed as Derived, ForceNew, InPlace};
        use Presence::{Computed, Optional, Required};

        let (kind, presence, mutability) = match self {
            Attribute::NodeName => (ValueKind::String, Required, ForceNew),
            Attribute::Alias => (ValueKind::String, Required, InPlace),
            Attribute::Autoboot => (ValueKind::Bool, Optional, InPlace),
            Attribute::Brand => (ValueKind::String, Required, ForceNew),
            Attribute::CpuCap => (ValueKind::Int, Optional, InPlace),
            Attribute::CustomerMetadata => (ValueKind::StringMap, Optional, InPlace),
            Attribute::Metadata => (ValueKind::StringMap, Computed, Derived),
            Attribute::Disks => (ValueKind::DiskList, Optional, ForceNew),
            Attribute::ImageUuid => (ValueKind::String, Optional, ForceNew),
            Attribute::KernelVersion => (ValueKind::String, Optional, ForceNew),
            Attribute::MaintainResolvers => (ValueKind::Bool, Optional, InPlace),
            Attribute::MaxPhysicalMemory => (ValueKind::Int, Optional, InPlace),
            Attribute::Nics => (ValueKind::NicList, Optional, ForceNew),
            Attribute::PrimaryIp => (ValueKind::String, Computed, Derived),
            Attribute::Quota => (ValueKind::Int, Optional, InPlace),
            Attribute::Ram => (ValueKind::Int, Optional, ForceNew),
            Attribute::Resolvers => (ValueKind::StringList, Optional, InPlace),
            Attribute::Vcpus => (ValueKind::Int, Optional, ForceNew),
            Attribute::State => (ValueKind::String, Computed, Derived),
        };

        AttributeSpec {
            name: self.name(),
            kind,
            presence,
            mutability,
        }
    }

    /// Wire / schema name
    pub fn name(self) -> &'static str {
        match self {
            Attribute::NodeName => "node_name",
            Attribute::Alias => "alias",
            Attribute::Autoboot => "autoboot",
            Attribute::Brand => "brand",
            Attribute::CpuCap => "cpu_cap",
            Attribute::CustomerMetadata => "customer_metadata",
            Attribute::Metadata => "metadata",
            Attribute::Disks => "disks",
            Attribute::ImageUuid => "image_uuid",
            Attribute::KernelVersion => "kernel_version",
            Attribute::MaintainResolvers => "maintain_resolvers",
            Attribute::MaxPhysicalMemory => "max_physical_memory",
            Attribute::Nics => "nics",
            Attribute::PrimaryIp => "primary_ip",
            Attribute::Quota => "quota",
            Attribute::Ram => "ram",
            Attribute::Resolvers => "resolvers",
            Attribute::Vcpus => "vcpus",
            Attribute::State => "state",
        }
    }

    pub fn mutability(self) -> Mutability {
        self.spec().mutability
    }
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The full attribute table, in declaration order
pub fn machine_schema() -> Vec<AttributeSpec> {
    Attribute::ALL.iter().map(|a| a.spec()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immutable_attributes_force_new() {
        for attribute in [
            Attribute::NodeName,
            Attribute::Brand,
            Attribute::Disks,
            Attribute::Nics,
            Attribute::KernelVersion,
            Attribute::Ram,
            Attribute::Vcpus,
            Attribute::ImageUuid,
        ] {
            assert_eq!(attribute.mutability(), Mutability::ForceNew, "{}", attribute);
        }
    }

    #[test]
    fn test_schema_covers_every_attribute_once() {
        let schema = machine_schema();
        let mut names: Vec<&str> = schema.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Attribute::ALL.len());
    }

    #[test]
    fn test_computed_attributes_are_not_declared() {
        for spec in machine_schema() {
            if spec.mutability == Mutability::Computed {
                assert_eq!(spec.presence, Presence::Computed, "{}", spec.name);
            }
        }
    }
}
