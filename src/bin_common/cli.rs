//! CLI utilities for binaries
//!
//! Handles configuration resolution and loading for the probe binary.

use std::path::{Path, PathBuf};

use anyhow::Context;
use gateherd::ClientConfig;

/// Environment variable pointing at the client config file
pub const CONFIG_PATH_ENV: &str = "GATEHERD_CONFIG";

/// Default config path when the environment does not say otherwise
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Resolve the config path from the environment or fall back to the default
///
/// # Returns
/// Path to the configuration file
pub fn config_path_from_env() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
        .into()
}

/// Load and parse a client configuration file
///
/// # Arguments
/// * `path` - Path to a YAML client config
///
/// # Returns
/// The parsed [`ClientConfig`], or an error naming the offending file
pub fn load_client_config(path: &Path) -> anyhow::Result<ClientConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: ClientConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        std::env::remove_var(CONFIG_PATH_ENV);
        assert_eq!(config_path_from_env(), PathBuf::from("config.yaml"));
    }

    #[test]
    fn test_missing_config_file_names_the_path() {
        let err = load_client_config(Path::new("does/not/exist.yaml")).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.yaml"));
    }
}
