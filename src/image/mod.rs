// file: src/image/mod.rs
// version: 2.0.0
// guid: a1b2c3d4-e5f6-7890-1234-567890abcdef

//! Image catalog handling
//!
//! Images are identified by name and version in declarations but by UUID on
//! the node. The resolver bridges the two and imports missing images.

use crate::parser::ImageManifest;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod resolver;

pub use resolver::ImageResolver;

/// An installable image as seen from one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub node_name: String,
    pub id: Uuid,
    pub name: String,
    pub version: String,
}

impl Image {
    pub(crate) fn from_manifest(node: &str, manifest: ImageManifest) -> Self {
        Self {
            node_name: node.to_string(),
            id: manifest.uuid,
            name: manifest.name,
            version: manifest.version,
        }
    }
}
