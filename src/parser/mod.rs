// file: src/parser/mod.rs
// version: 1.0.0
// guid: 4981ed30-e280-4fe3-82df-42da468d7caf

//! Interpretation of raw command output

pub mod json;
pub mod marker;

pub use json::{decode_image_manifests, decode_machine, ImageManifest};
pub use marker::{MarkerMatcher, ResponseMatcher};
