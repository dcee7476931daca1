// file: src/config/loader.rs
// version: 2.1.0
// guid: d4e5f6g7-h8i9-0123-4567-890123defghi

//! Configuration file loading and environment variable substitution

use super::{MachineDeclaration, ProviderConfig};
use crate::error::FleetError;
use crate::Result;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
    env_vars: HashMap<String, String>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self {
            env_vars: std::env::vars().collect(),
        }
    }

    /// Default location of the provider configuration
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("smartos-fleet-agent").join("config.yaml"))
    }

    /// Load provider configuration from a YAML or TOML file
    pub fn load_provider_config<P: AsRef<Path>>(&self, path: P) -> Result<ProviderConfig> {
        let path = path.as_ref();
        info!("Loading provider configuration from: {}", path.display());

        let expanded = self.read_expanded(path, "provider config")?;
        let is_toml = path.extension().map_or(false, |ext| ext == "toml");
        let mut config: ProviderConfig = if is_toml {
            toml::from_str(&expanded)?
        } else {
            serde_yaml::from_str(&expanded)?
        };

        config = config.apply_env_overrides();
        if let Some(key) = config.private_key.take() {
            config.private_key = Some(self.expand_path(&key)?);
        }
        if let Some(known_hosts) = config.known_hosts.take() {
            config.known_hosts = Some(self.expand_path(&known_hosts)?);
        }

        // Validate configuration
        config.validate()?;

        debug!("Configured nodes: {:?}", config.hosts.keys().collect::<Vec<_>>());
        Ok(config)
    }

    /// Load a machine declaration from a YAML file.
    ///
    /// Declarations are read verbatim; `${VAR}` in metadata values is kept as written.
    pub fn load_declaration<P: AsRef<Path>>(&self, path: P) -> Result<MachineDeclaration> {
        let content = read_file(path.as_ref(), "machine declaration")?;
        let declaration: MachineDeclaration = serde_yaml::from_str(&content)?;
        Ok(declaration)
    }

    fn read_expanded(&self, path: &Path, what: &str) -> Result<String> {
        let content = read_file(path, what)?;
        self.expand_env_vars(&content)
    }

    /// Expand `~` and environment variables in a path
    fn expand_path(&self, path: &Path) -> Result<PathBuf> {
        let raw = path.to_string_lossy();
        let expanded = shellexpand::full_with_context(
            raw.as_ref(),
            || dirs::home_dir().map(|home| home.to_string_lossy().into_owned()),
            |name: &str| -> std::result::Result<Option<String>, String> {
                Ok(self.env_vars.get(name).cloned())
            },
        )
        .map_err(|e| FleetError::configuration(format!("Failed to expand path {}: {}", raw, e)))?;

        Ok(PathBuf::from(expanded.as_ref()))
    }

    /// Expand environment variables in configuration content
    fn expand_env_vars(&self, content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| FleetError::configuration(format!("Invalid regex pattern: {}", e)))?;

        let mut result = content.to_string();
        let mut missing_vars = Vec::new();

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];

            if let Some(value) = self.env_vars.get(var_name) {
                result = result.replace(placeholder, value);
            } else if !missing_vars.iter().any(|v| v == var_name) {
                missing_vars.push(var_name.to_string());
            }
        }

        if !missing_vars.is_empty() {
            return Err(FleetError::configuration(format!(
                "Missing environment variables: {}",
                missing_vars.join(", ")
            )));
        }

        Ok(result)
    }

    /// Set environment variable for substitution
    pub fn set_env_var(&mut self, key: String, value: String) {
        self.env_vars.insert(key, value);
    }
}

fn read_file(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        FleetError::configuration(format!(
            "Failed to read {} file {}: {}",
            what,
            path.display(),
            e
        ))
    })
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
