// file: src/parser/marker.rs
// version: 1.0.0
// guid: 48a37c24-ef40-4a23-9ec9-ba0166d87edf

//! Success-marker extraction from free-text tool output

use crate::error::{FleetError, Result};
use regex::Regex;
use uuid::Uuid;

const UUID_PATTERN: &str = "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}";

/// Extracts a machine identifier from text output
pub trait ResponseMatcher: Send + Sync {
    /// Locate exactly one success marker in `output`
    fn extract(&self, command: &str, output: &str) -> Result<Uuid>;
}

/// Regex matcher for `<phrase> <uuid>` markers
#[derive(Debug, Clone)]
pub struct MarkerMatcher {
    pattern: Regex,
}

impl MarkerMatcher {
    pub fn new(phrase: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(r"{} ({})", regex::escape(phrase), UUID_PATTERN))
            .map_err(|e| FleetError::configuration(format!("Invalid regex pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Matches `vmadm create` output
    pub fn created() -> Result<Self> {
        Self::new("Successfully created VM")
    }

    /// Matches `vmadm delete` output
    pub fn deleted() -> Result<Self> {
        Self::new("Successfully deleted VM")
    }
}

impl ResponseMatcher for MarkerMatcher {
    fn extract(&self, command: &str, output: &str) -> Result<Uuid> {
        let unrecognized = || FleetError::UnrecognizedResponse {
            command: command.to_string(),
            raw: output.to_string(),
        };

        let mut matches = self.pattern.captures_iter(output);
        let first = matches.next().ok_or_else(unrecognized)?;
        if matches.next().is_some() {
            return Err(unrecognized());
        }

        Uuid::parse_str(&first[1]).map_err(|_| unrecognized())
    }
}
