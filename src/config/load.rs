//! Loading and saving YAML configuration files

use super::schema::MutualInfoConfig;
use super::validate::validate_config;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Load and validate a configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<MutualInfoConfig> {
    let yaml_content = fs::read_to_string(config_path.as_ref()).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read config file {}: {}",
            config_path.as_ref().display(),
            e
        ))
    })?;

    from_yaml_str(&yaml_content)
}

/// Parse and validate a configuration from YAML text
pub fn from_yaml_str(yaml: &str) -> Result<MutualInfoConfig> {
    let config: MutualInfoConfig = serde_yaml::from_str(yaml)
        .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {}", e)))?;

    validate_config(&config).map_err(|e| Error::ConfigError(format!("Invalid config: {}", e)))?;

    Ok(config)
}

/// Serialize a configuration to YAML text
pub fn to_yaml(config: &MutualInfoConfig) -> Result<String> {
    serde_yaml::to_string(config).map_err(|e| Error::Serialization(e.to_string()))
}

/// Write a configuration to a YAML file
pub fn save_config<P: AsRef<Path>>(config: &MutualInfoConfig, path: P) -> Result<()> {
    fs::write(path, to_yaml(config)?)?;
    Ok(())
}
