// file: src/parser/json.rs
// version: 1.0.0
// guid: 58d9b1c9-04a2-49b0-96d5-8d8b63cc3270

//! Structured decoding of `vmadm get` and `imgadm -j` documents

use crate::error::{FleetError, Result};
use crate::machine::Machine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

/// One entry of `imgadm list -j` / `imgadm avail -j`
#[derive(Debug, Clone, Deserialize)]
pub struct ImageEntry {
    pub manifest: ImageManifest,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageManifest {
    pub uuid: Uuid,
    pub name: String,
    pub version: String,
}

fn decode<T: DeserializeOwned>(command: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        let raw = String::from_utf8_lossy(bytes).to_string();
        error!("Failed to decode output of '{}': {}", command, e);
        error!("RAW: {}", raw);
        FleetError::MalformedResponse {
            command: command.to_string(),
            message: e.to_string(),
            raw,
        }
    })
}

/// Decode a single machine document
pub fn decode_machine(command: &str, bytes: &[u8]) -> Result<Machine> {
    decode(command, bytes)
}

/// Decode an image catalog listing into its manifests
pub fn decode_image_manifests(command: &str, bytes: &[u8]) -> Result<Vec<ImageManifest>> {
    let entries: Vec<ImageEntry> = decode(command, bytes)?;
    Ok(entries.into_iter().map(|entry| entry.manifest).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_machine_rejects_wrong_types() {
        let result = decode_machine("vmadm get x", br#"{"alias": 42}"#);

        match result {
            Err(FleetError::MalformedResponse { command, raw, .. }) => {
                assert_eq!(command, "vmadm get x");
                assert_eq!(raw, r#"{"alias": 42}"#);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_machine_rejects_non_json() {
        let result = decode_machine("vmadm get x", b"vmadm: zone not found");
        assert!(matches!(result, Err(FleetError::MalformedResponse { .. })));
    }

    #[test]
    fn test_decode_image_manifests() {
        let raw = br#"[
            {
                "manifest": {
                    "v": 2,
                    "uuid": "1d05e788-5409-11eb-b12f-037bd7fee4ee",
                    "name": "base-64-lts",
                    "version": "20.4.0",
                    "type": "zone-dataset"
                },
                "zpool": "zones",
                "source": "https://images.smartos.org"
            }
        ]"#;

        let manifests = decode_image_manifests("imgadm list -j", raw).unwrap();

        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].name, "base-64-lts");
        assert_eq!(manifests[0].version, "20.4.0");
    }

    #[test]
    fn test_decode_empty_listing() {
        let manifests = decode_image_manifests("imgadm avail -j", b"[]").unwrap();
        assert!(manifests.is_empty());
    }

    #[test]
    fn test_manifest_missing_uuid_is_malformed() {
        let raw = br#"[{"manifest": {"name": "base", "version": "1"}}]"#;
        let result = decode_image_manifests("imgadm list -j", raw);
        assert!(matches!(result, Err(FleetError::MalformedResponse { .. })));
    }
}
