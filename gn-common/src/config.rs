//! Configuration loading for GeoNarrate
//!
//! Values resolve with the priority: environment variable → TOML config
//! file → compiled default. The TOML file lives in the platform config
//! directory (`~/.config/geonarrate/config.toml` on Linux, with
//! `/etc/geonarrate/config.toml` as the system fallback).

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Default TCP port for the tour service
pub const DEFAULT_PORT: u16 = 5931;

/// Contents of the optional TOML config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Gemini API key
    pub gemini_api_key: Option<String>,
    /// Listen port for the HTTP shell
    pub port: Option<u16>,
    /// Listen address for the HTTP shell
    pub bind_address: Option<String>,
}

impl TomlConfig {
    /// Load the config file if one exists; an absent file yields defaults
    pub fn load() -> Result<Self> {
        let Some(path) = find_config_file() else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(&path)?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        tracing::info!(path = %path.display(), "Loaded TOML config");
        Ok(config)
    }
}

/// Locate the config file for the platform
///
/// Tries the user config directory first, then the system-wide path.
/// Returns None when neither exists.
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("geonarrate").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/geonarrate/config.toml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Resolve the listen port: env var → TOML → default
pub fn resolve_port(toml_config: &TomlConfig) -> Result<u16> {
    if let Ok(value) = std::env::var("GEONARRATE_PORT") {
        return value
            .parse()
            .map_err(|_| Error::Config(format!("Invalid GEONARRATE_PORT value: {}", value)));
    }

    Ok(toml_config.port.unwrap_or(DEFAULT_PORT))
}

/// Resolve the listen address: env var → TOML → localhost
pub fn resolve_bind_address(toml_config: &TomlConfig) -> String {
    if let Ok(value) = std::env::var("GEONARRATE_BIND_ADDRESS") {
        return value;
    }

    toml_config
        .bind_address
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_parsing() {
        let config: TomlConfig = toml::from_str(
            r#"
            gemini_api_key = "test-key"
            port = 8080
            "#,
        )
        .unwrap();

        assert_eq!(config.gemini_api_key.as_deref(), Some("test-key"));
        assert_eq!(config.port, Some(8080));
        assert!(config.bind_address.is_none());
    }

    #[test]
    fn test_port_default() {
        std::env::remove_var("GEONARRATE_PORT");
        let config = TomlConfig::default();
        assert_eq!(resolve_port(&config).unwrap(), DEFAULT_PORT);
    }

    #[test]
    fn test_port_from_toml() {
        std::env::remove_var("GEONARRATE_PORT");
        let config = TomlConfig {
            port: Some(9000),
            ..Default::default()
        };
        assert_eq!(resolve_port(&config).unwrap(), 9000);
    }
}
