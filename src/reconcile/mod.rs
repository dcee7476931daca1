// file: src/reconcile/mod.rs
// version: 1.0.0
// guid: 9d452ed0-b01b-4077-ade5-c55abbe90279

//! Declared-state reconciliation
//!
//! Compares the previously declared machine against the newly declared one.
//! Observed remote state never takes part in the comparison.

use crate::machine::{Attribute, Machine, Mutability};
use serde::Serialize;
use std::collections::BTreeMap;

/// Keys to set and keys to drop when moving from one map to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapDelta<K: Ord, V> {
    pub set: BTreeMap<K, V>,
    pub remove: Vec<K>,
}

impl<K: Ord, V> MapDelta<K, V> {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }
}

/// Diff two maps under `eq`.
///
/// `set` holds every key of `new` that is missing from `old` or whose value
/// differs; `remove` holds every key of `old` missing from `new`, in key order.
pub fn reconcile_maps<K, V, F>(old: &BTreeMap<K, V>, new: &BTreeMap<K, V>, eq: F) -> MapDelta<K, V>
where
    K: Ord + Clone,
    V: Clone,
    F: Fn(&V, &V) -> bool,
{
    let set = new
        .iter()
        .filter(|(key, value)| match old.get(*key) {
            Some(previous) => !eq(previous, value),
            None => true,
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let remove = old
        .keys()
        .filter(|key| !new.contains_key(*key))
        .cloned()
        .collect();

    MapDelta { set, remove }
}

/// Result of comparing two declarations of the same machine
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    /// Only the changed in-place attributes plus metadata deltas
    pub payload: Machine,
    /// Attributes whose change requires destroying and recreating the machine
    pub force_new: Vec<Attribute>,
}

impl UpdatePlan {
    /// Nothing to send to the node
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty_update()
    }

    pub fn requires_recreation(&self) -> bool {
        !self.force_new.is_empty()
    }

    /// Attributes that would change in place, in schema order
    pub fn changed(&self) -> Vec<Attribute> {
        let p = &self.payload;
        let mut changed = Vec::new();
        let checks = [
            (Attribute::Alias, !p.alias.is_empty()),
            (Attribute::Autoboot, p.autoboot.is_some()),
            (Attribute::CpuCap, p.cpu_cap.is_some()),
            (
                Attribute::CustomerMetadata,
                !p.set_customer_metadata.is_empty() || !p.remove_customer_metadata.is_empty(),
            ),
            (Attribute::MaintainResolvers, p.maintain_resolvers.is_some()),
            (Attribute::MaxPhysicalMemory, p.max_physical_memory.is_some()),
            (Attribute::Quota, p.quota.is_some()),
            (Attribute::Resolvers, !p.resolvers.is_empty()),
        ];
        for (attribute, did_change) in checks {
            if did_change {
                changed.push(attribute);
            }
        }
        changed
    }
}

fn changed_to<T: PartialEq + Clone>(previous: &T, desired: &T) -> Option<T> {
    (previous != desired).then(|| desired.clone())
}

/// Compute the update payload taking `previous` to `desired`.
///
/// An in-place scalar that was cleared in `desired` cannot be expressed as a
/// payload field and is left untouched on the node.
pub fn plan_update(previous: &Machine, desired: &Machine) -> UpdatePlan {
    let metadata = reconcile_maps(
        &previous.customer_metadata,
        &desired.customer_metadata,
        |a, b| a == b,
    );

    let payload = Machine {
        node_name: desired.node_name.clone(),
        alias: changed_to(&previous.alias, &desired.alias).unwrap_or_default(),
        autoboot: changed_to(&previous.autoboot, &desired.autoboot).flatten(),
        cpu_cap: changed_to(&previous.cpu_cap, &desired.cpu_cap).flatten(),
        maintain_resolvers: changed_to(&previous.maintain_resolvers, &desired.maintain_resolvers)
            .flatten(),
        max_physical_memory: changed_to(&previous.max_physical_memory, &desired.max_physical_memory)
            .flatten(),
        quota: changed_to(&previous.quota, &desired.quota).flatten(),
        resolvers: changed_to(&previous.resolvers, &desired.resolvers).unwrap_or_default(),
        set_customer_metadata: metadata.set,
        remove_customer_metadata: metadata.remove,
        ..Machine::default()
    };

    UpdatePlan {
        payload,
        force_new: force_new_changes(previous, desired),
    }
}

/// Recreation-only attributes that differ between the two declarations
pub fn force_new_changes(previous: &Machine, desired: &Machine) -> Vec<Attribute> {
    Attribute::ALL
        .iter()
        .copied()
        .filter(|attribute| attribute.mutability() == Mutability::ForceNew)
        .filter(|attribute| match attribute {
            Attribute::NodeName => previous.node_name != desired.node_name,
            Attribute::Brand => previous.brand != desired.brand,
            Attribute::Disks => previous.disks != desired.disks,
            Attribute::ImageUuid => previous.base_image() != desired.base_image(),
            Attribute::KernelVersion => previous.kernel_version != desired.kernel_version,
            Attribute::Nics => previous.network_interfaces != desired.network_interfaces,
            Attribute::Ram => previous.ram != desired.ram,
            Attribute::Vcpus => previous.vcpus != desired.vcpus,
            _ => false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{Disk, NetworkInterface};
    use serde_json::json;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn declared() -> Machine {
        let mut machine = Machine::new("node-a");
        machine.alias = "web-1".to_string();
        machine.brand = "joyent".to_string();
        machine.ram = Some(1024);
        machine.quota = Some(20);
        machine.resolvers = vec!["8.8.8.8".to_string()];
        machine.customer_metadata = map(&[("role", "web")]);
        machine
    }

    #[test]
    fn test_reconcile_maps_set_and_remove() {
        // Arrange
        let old = map(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let new = map(&[("a", "1"), ("b", "20"), ("d", "4")]);

        // Act
        let delta = reconcile_maps(&old, &new, |x, y| x == y);

        // Assert
        assert_eq!(delta.set, map(&[("b", "20"), ("d", "4")]));
        assert_eq!(delta.remove, vec!["c".to_string()]);
    }

    #[test]
    fn test_reconcile_maps_partition_holds_across_cases() {
        let cases = [
            (map(&[]), map(&[])),
            (map(&[]), map(&[("k", "v")])),
            (map(&[("k", "v")]), map(&[])),
            (map(&[("k", "v")]), map(&[("k", "v")])),
            (map(&[("k", "v")]), map(&[("k", "V")])),
            (map(&[("k", "")]), map(&[("k", " ")])),
            (map(&[("x", "1"), ("y", "2")]), map(&[("y", "2"), ("z", "3")])),
        ];

        for (old, new) in cases {
            let delta = reconcile_maps(&old, &new, |a, b| a == b);

            for (key, value) in &new {
                let expect_set = old.get(key) != Some(value);
                assert_eq!(delta.set.contains_key(key), expect_set, "key {}", key);
            }
            for key in old.keys() {
                assert_eq!(delta.remove.contains(key), !new.contains_key(key), "key {}", key);
            }
            for key in delta.set.keys() {
                assert!(new.contains_key(key));
            }
            for key in &delta.remove {
                assert!(!delta.set.contains_key(key));
            }
        }
    }

    #[test]
    fn test_reconcile_maps_custom_comparison() {
        let old = map(&[("name", "Web")]);
        let new = map(&[("name", "web")]);

        let delta = reconcile_maps(&old, &new, |a, b| a.eq_ignore_ascii_case(b));

        assert!(delta.is_empty());
    }

    #[test]
    fn test_alias_only_change() {
        // Arrange
        let previous = declared();
        let mut desired = declared();
        desired.alias = "web-2".to_string();

        // Act
        let plan = plan_update(&previous, &desired);

        // Assert
        assert_eq!(serde_json::to_value(&plan.payload).unwrap(), json!({ "alias": "web-2" }));
        assert_eq!(plan.changed(), vec![Attribute::Alias]);
        assert!(plan.force_new.is_empty());
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_identical_declarations_produce_empty_plan() {
        let plan = plan_update(&declared(), &declared());

        assert!(plan.is_empty());
        assert!(plan.changed().is_empty());
        assert!(!plan.requires_recreation());
    }

    #[test]
    fn test_metadata_delta_in_payload() {
        let previous = declared();
        let mut desired = declared();
        desired.customer_metadata = map(&[("tier", "front")]);

        let plan = plan_update(&previous, &desired);

        assert_eq!(
            serde_json::to_value(&plan.payload).unwrap(),
            json!({
                "set_customer_metadata": { "tier": "front" },
                "remove_customer_metadata": ["role"]
            })
        );
    }

    #[test]
    fn test_zero_quota_is_a_change() {
        let previous = declared();
        let mut desired = declared();
        desired.quota = Some(0);

        let plan = plan_update(&previous, &desired);

        assert_eq!(serde_json::to_value(&plan.payload).unwrap(), json!({ "quota": 0 }));
    }

    #[test]
    fn test_immutable_changes_are_reported_not_sent() {
        // Arrange
        let previous = declared();
        let mut desired = declared();
        desired.ram = Some(2048);
        desired.brand = "lx".to_string();
        desired.disks = vec![Disk {
            size: Some(10240),
            ..Disk::default()
        }];
        desired.network_interfaces = vec![NetworkInterface {
            interface: "net0".to_string(),
            ..NetworkInterface::default()
        }];

        // Act
        let plan = plan_update(&previous, &desired);

        // Assert
        assert!(plan.is_empty());
        assert_eq!(
            plan.force_new,
            vec![Attribute::Brand, Attribute::Disks, Attribute::Nics, Attribute::Ram]
        );
    }

    #[test]
    fn test_nil_image_equals_no_image() {
        let mut previous = declared();
        previous.image_uuid = None;
        let mut desired = declared();
        desired.image_uuid = Some(uuid::Uuid::nil());

        assert!(force_new_changes(&previous, &desired).is_empty());
    }
}
