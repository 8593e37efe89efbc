//! Configuration resolution for gn-tour
//!
//! Provides two-tier resolution of the Gemini API key with
//! ENV → TOML priority.

use gn_common::config::TomlConfig;
use gn_common::{Error, Result};
use tracing::{info, warn};

/// Resolve the Gemini API key from 2-tier configuration
///
/// **Priority:** Environment variable → TOML config
pub fn resolve_gemini_api_key(toml_config: &TomlConfig) -> Result<String> {
    let mut sources = Vec::new();

    let env_key = std::env::var("GEONARRATE_GEMINI_API_KEY").ok();
    if let Some(key) = &env_key {
        if is_valid_key(key) {
            sources.push("environment");
        }
    }

    let toml_key = toml_config.gemini_api_key.as_ref();
    if let Some(key) = toml_key {
        if is_valid_key(key) {
            sources.push("TOML");
        }
    }

    // Warn if multiple sources (potential misconfiguration)
    if sources.len() > 1 {
        warn!(
            "Gemini API key found in multiple sources: {}. Using environment (highest priority).",
            sources.join(", ")
        );
    }

    if let Some(key) = env_key {
        if is_valid_key(&key) {
            info!("Gemini API key loaded from environment variable");
            return Ok(key);
        }
    }

    if let Some(key) = toml_key {
        if is_valid_key(key) {
            info!("Gemini API key loaded from TOML config");
            return Ok(key.clone());
        }
    }

    Err(Error::Config(
        "Gemini API key not configured. Set GEONARRATE_GEMINI_API_KEY or add \
         gemini_api_key to the config file."
            .to_string(),
    ))
}

/// Basic shape check: non-empty and free of whitespace
fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_validation() {
        assert!(is_valid_key("AIzaSyExample123"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("key with spaces"));
    }

    #[test]
    fn test_toml_key_resolution() {
        std::env::remove_var("GEONARRATE_GEMINI_API_KEY");
        let config = TomlConfig {
            gemini_api_key: Some("toml-key".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_gemini_api_key(&config).unwrap(), "toml-key");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        std::env::remove_var("GEONARRATE_GEMINI_API_KEY");
        let config = TomlConfig::default();
        assert!(resolve_gemini_api_key(&config).is_err());
    }
}
