// file: src/machine/model.rs
// version: 1.2.0
// guid: c4ea9b2f-77fb-4b37-903c-a1efea20734d

//! Typed machine, disk and network interface entities
//!
//! The wire names match the JSON emitted by `vmadm get` and accepted by
//! `vmadm create` / `vmadm update`. Empty strings, empty collections and unset
//! optionals are left out of encoded payloads so an update only carries the
//! fields that were explicitly placed on it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Customer metadata keys carrying this prefix are engine-managed
pub const SCOPED_METADATA_PREFIX: &str = "terraform:";

/// Brands that use OS virtualization and therefore boot from a base image
pub const OS_VIRTUALIZED_BRANDS: &[&str] = &["joyent", "joyent-minimal", "lx"];

/// A machine (zone or hardware VM) on a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    /// Owning node; never part of the wire document
    #[serde(skip)]
    pub node_name: String,

    /// Assigned by the node on create, absent before
    #[serde(rename = "uuid", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alias: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoboot: Option<bool>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub brand: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_cap: Option<u32>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub customer_metadata: BTreeMap<String, String>,

    /// Update-only: keys to add or overwrite
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set_customer_metadata: BTreeMap<String, String>,

    /// Update-only: keys to drop
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_customer_metadata: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<Disk>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uuid: Option<Uuid>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kernel_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintain_resolvers: Option<bool>,

    /// MiB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_physical_memory: Option<u64>,

    #[serde(rename = "nics", default, skip_serializing_if = "Vec::is_empty")]
    pub network_interfaces: Vec<NetworkInterface>,

    /// GiB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota: Option<u64>,

    /// MiB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolvers: Vec<String>,

    #[serde(rename = "vcpus", default, skip_serializing_if = "Option::is_none")]
    pub vcpus: Option<u32>,

    /// Observed run state; never sent to the node
    #[serde(default, skip_serializing)]
    pub state: String,

    /// Derived from the primary NIC after a read
    #[serde(skip)]
    pub primary_ip: String,

    /// Scoped view of customer metadata with the prefix stripped
    #[serde(skip)]
    pub metadata: BTreeMap<String, String>,
}

/// A disk attached to a hardware-virtualized machine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub boot: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub compression: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uuid: Option<Uuid>,

    /// MiB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<u64>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,

    /// MiB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// A network interface attachment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    #[serde(default)]
    pub allow_ip_spoofing: bool,

    #[serde(default)]
    pub allow_mac_spoofing: bool,

    #[serde(default)]
    pub allow_restricted_traffic: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gateways: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub interface: String,

    /// Declared addresses, CIDR notation allowed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ips: Vec<String>,

    /// Observed address reported by `vmadm get`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(default, skip_serializing)]
    pub mac: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,

    #[serde(rename = "nic_tag", default, skip_serializing_if = "String::is_empty")]
    pub tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u16>,

    /// VRRP virtual router id; `None` means no VRRP, zero is not a valid id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrrp_vrid: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrrp_primary_ip: Option<String>,
}

/// Connection details a caller can use to reach the machine itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub host: String,
}

impl Machine {
    /// Create an empty machine owned by `node_name`
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            ..Self::default()
        }
    }

    /// Base image reference, treating the nil uuid as absent
    pub fn base_image(&self) -> Option<Uuid> {
        self.image_uuid.filter(|id| !id.is_nil())
    }

    /// Whether the brand boots from a base image rather than from disks
    pub fn is_os_virtualized(&self) -> bool {
        OS_VIRTUALIZED_BRANDS.contains(&self.brand.as_str())
    }

    /// Every image this machine needs on its node: base image first, then disks in order
    pub fn referenced_images(&self) -> Vec<Uuid> {
        let mut images: Vec<Uuid> = Vec::new();
        let candidates = self
            .base_image()
            .into_iter()
            .chain(self.disks.iter().filter_map(Disk::image));

        for id in candidates {
            if !images.contains(&id) {
                images.push(id);
            }
        }
        images
    }

    /// Recompute the primary IP and the scoped metadata view.
    ///
    /// Keys with `prefix` move out of `customer_metadata` into `metadata`
    /// with the prefix stripped.
    pub fn refresh_derived(&mut self, prefix: &str) {
        self.update_primary_ip();
        self.split_scoped_metadata(prefix);
    }

    fn update_primary_ip(&mut self) {
        self.primary_ip = self
            .network_interfaces
            .iter()
            .find(|nic| nic.primary == Some(true))
            .and_then(NetworkInterface::address)
            .unwrap_or_default();
    }

    fn split_scoped_metadata(&mut self, prefix: &str) {
        let scoped_keys: Vec<String> = self
            .customer_metadata
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();

        let mut metadata = BTreeMap::new();
        for key in scoped_keys {
            if let Some(value) = self.customer_metadata.remove(&key) {
                metadata.insert(key[prefix.len()..].to_string(), value);
            }
        }
        self.metadata = metadata;
    }

    /// SSH connection info for the guest, when it has a primary address
    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        if self.primary_ip.is_empty() {
            return None;
        }
        Some(ConnectionInfo {
            kind: "ssh".to_string(),
            host: self.primary_ip.clone(),
        })
    }

    /// True when the payload would not change anything on the node
    pub fn is_empty_update(&self) -> bool {
        let id_only = Machine {
            node_name: self.node_name.clone(),
            id: self.id,
            ..Machine::default()
        };
        *self == id_only
    }
}

impl Disk {
    /// Source image, treating the nil uuid as absent
    pub fn image(&self) -> Option<Uuid> {
        self.image_uuid.filter(|id| !id.is_nil())
    }
}

impl NetworkInterface {
    /// The usable address of this interface without any prefix length
    pub fn address(&self) -> Option<String> {
        if let Some(ip) = self.ip.as_ref().filter(|ip| !ip.is_empty()) {
            return Some(ip.clone());
        }
        self.ips
            .iter()
            .find(|ip| !ip.is_empty() && ip.as_str() != "dhcp")
            .map(|ip| ip.split('/').next().unwrap_or(ip).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nic(ip: Option<&str>, ips: &[&str], primary: Option<bool>) -> NetworkInterface {
        NetworkInterface {
            ip: ip.map(str::to_string),
            ips: ips.iter().map(|s| s.to_string()).collect(),
            primary,
            ..NetworkInterface::default()
        }
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let machine = Machine {
            node_name: "node-a".to_string(),
            alias: "web01".to_string(),
            ..Machine::default()
        };

        let encoded = serde_json::to_value(&machine).unwrap();

        assert_eq!(encoded, json!({ "alias": "web01" }));
    }

    #[test]
    fn test_zero_is_distinct_from_unset() {
        let machine = Machine {
            cpu_cap: Some(0),
            ..Machine::default()
        };

        let encoded = serde_json::to_value(&machine).unwrap();

        assert_eq!(encoded, json!({ "cpu_cap": 0 }));
    }

    #[test]
    fn test_decode_vmadm_get_output() {
        let raw = json!({
            "uuid": "550e8400-e29b-41d4-a716-446655440000",
            "alias": "db01",
            "brand": "joyent",
            "state": "running",
            "zonepath": "/zones/550e8400-e29b-41d4-a716-446655440000",
            "image_uuid": "1d05e788-5409-11eb-b12f-037bd7fee4ee",
            "max_physical_memory": 1024,
            "quota": 20,
            "customer_metadata": { "role": "db", "terraform:owner": "ops" },
            "nics": [{
                "interface": "net0",
                "mac": "90:b8:d0:1f:2e:3d",
                "nic_tag": "admin",
                "ip": "10.0.0.5",
                "netmask": "255.255.255.0",
                "primary": true
            }]
        });

        let mut machine: Machine = serde_json::from_value(raw).unwrap();
        machine.refresh_derived(SCOPED_METADATA_PREFIX);

        assert_eq!(machine.alias, "db01");
        assert_eq!(machine.state, "running");
        assert_eq!(machine.max_physical_memory, Some(1024));
        assert_eq!(machine.primary_ip, "10.0.0.5");
        assert_eq!(machine.network_interfaces[0].vrrp_vrid, None);
        assert_eq!(machine.metadata.get("owner").map(String::as_str), Some("ops"));
        assert!(!machine.customer_metadata.contains_key("terraform:owner"));
        assert_eq!(machine.customer_metadata.get("role").map(String::as_str), Some("db"));
    }

    #[test]
    fn test_state_is_never_encoded() {
        let machine = Machine {
            state: "running".to_string(),
            primary_ip: "10.0.0.5".to_string(),
            ..Machine::default()
        };

        let encoded = serde_json::to_value(&machine).unwrap();
        assert_eq!(encoded, json!({}));
    }

    #[test]
    fn test_primary_ip_uses_first_primary_nic() {
        let mut machine = Machine::default();
        machine.network_interfaces = vec![
            nic(Some("192.168.1.10"), &[], None),
            nic(None, &["10.1.1.20/24"], Some(true)),
            nic(Some("10.9.9.9"), &[], Some(true)),
        ];

        machine.refresh_derived(SCOPED_METADATA_PREFIX);

        assert_eq!(machine.primary_ip, "10.1.1.20");
    }

    #[test]
    fn test_primary_ip_empty_without_primary_nic() {
        let mut machine = Machine::default();
        machine.network_interfaces = vec![nic(Some("192.168.1.10"), &[], Some(false))];

        machine.refresh_derived(SCOPED_METADATA_PREFIX);

        assert_eq!(machine.primary_ip, "");
        assert!(machine.connection_info().is_none());
    }

    #[test]
    fn test_connection_info() {
        let machine = Machine {
            primary_ip: "10.0.0.5".to_string(),
            ..Machine::default()
        };

        let info = machine.connection_info().unwrap();
        assert_eq!(info.kind, "ssh");
        assert_eq!(info.host, "10.0.0.5");
    }

    #[test]
    fn test_referenced_images_skip_nil_and_duplicates() {
        let base = Uuid::parse_str("1d05e788-5409-11eb-b12f-037bd7fee4ee").unwrap();
        let data = Uuid::parse_str("9d2d5e4e-750b-11ea-8d8d-0f0e0d0c0b0a").unwrap();
        let machine = Machine {
            image_uuid: Some(base),
            disks: vec![
                Disk { image_uuid: Some(base), boot: true, ..Disk::default() },
                Disk { image_uuid: Some(Uuid::nil()), ..Disk::default() },
                Disk { image_uuid: Some(data), ..Disk::default() },
            ],
            ..Machine::default()
        };

        assert_eq!(machine.referenced_images(), vec![base, data]);
    }

    #[test]
    fn test_os_virtualized_brands() {
        let mut machine = Machine::new("node-a");
        machine.brand = "joyent".to_string();
        assert!(machine.is_os_virtualized());
        machine.brand = "lx".to_string();
        assert!(machine.is_os_virtualized());
        machine.brand = "bhyve".to_string();
        assert!(!machine.is_os_virtualized());
    }

    #[test]
    fn test_is_empty_update() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let mut update = Machine::new("node-a");
        update.id = Some(id);
        assert!(update.is_empty_update());

        update.remove_customer_metadata.push("role".to_string());
        assert!(!update.is_empty_update());
    }
}
