// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading probe configuration from JSON and YAML files in the
//! workspace and in the user's home directory.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::ProbeConfig;

/// Config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &[
    ".routeprobe.json",
    ".routeprobe.yaml",
    ".routeprobe.yml",
    "routeprobe.config.json",
];

/// Global config directory name.
pub const GLOBAL_CONFIG_DIR: &str = ".routeprobe";

/// Global config file name.
pub const GLOBAL_CONFIG_FILE: &str = "config.json";

/// Get the global config file path (~/.routeprobe/config.json).
pub fn get_global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILE))
}

/// Load global configuration, if the file exists.
pub fn load_global_config() -> Result<Option<ProbeConfig>, ConfigError> {
    let path = match get_global_config_path() {
        Some(p) => p,
        None => return Ok(None),
    };

    if !path.exists() {
        return Ok(None);
    }

    load_config_file(&path).map(Some)
}

/// Load workspace configuration from the first config file found in `root`.
pub fn load_workspace_config(root: &Path) -> Result<Option<ProbeConfig>, ConfigError> {
    for filename in CONFIG_FILES {
        let path = root.join(filename);
        if path.exists() {
            return load_config_file(&path).map(Some);
        }
    }
    Ok(None)
}

/// Load and validate a configuration file (JSON or YAML, by extension).
pub fn load_config_file(path: &Path) -> Result<ProbeConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let config: ProbeConfig = match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };
    config.validate()?;
    Ok(config)
}

/// Write `config` as pretty JSON to `root/.routeprobe.json`.
pub fn save_workspace_config(root: &Path, config: &ProbeConfig) -> Result<PathBuf, ConfigError> {
    let path = root.join(CONFIG_FILES[0]);
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_json_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("probe.json");
        std::fs::write(&path, r#"{"metrics": false, "topic": "web"}"#).unwrap();

        let config = load_config_file(&path).unwrap();
        assert!(!config.metrics);
        assert_eq!(config.topic.as_deref(), Some("web"));
    }

    #[test]
    fn test_load_yaml_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("probe.YAML");
        std::fs::write(&path, "requests: false\nrequestTopic: spans\n").unwrap();

        let config = load_config_file(&path).unwrap();
        assert!(!config.requests);
        assert_eq!(config.request_topic, "spans");
    }

    #[test]
    fn test_load_invalid_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("probe.json");
        std::fs::write(&path, "{metrics: ").unwrap();

        assert!(matches!(
            load_config_file(&path),
            Err(ConfigError::JsonError(_))
        ));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("probe.json");
        std::fs::write(&path, r#"{"channelCapacity": 0}"#).unwrap();

        assert!(matches!(
            load_config_file(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = load_config_file(&temp.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_workspace_search_order() {
        let temp = TempDir::new().unwrap();
        assert!(load_workspace_config(temp.path()).unwrap().is_none());

        std::fs::write(temp.path().join("routeprobe.config.json"), r#"{"topic": "last"}"#)
            .unwrap();
        std::fs::write(temp.path().join(".routeprobe.yaml"), "topic: first\n").unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        assert_eq!(config.topic.as_deref(), Some("first"));
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let config = ProbeConfig {
            strict_methods: true,
            channel_capacity: Some(128),
            ..ProbeConfig::default()
        };

        let path = save_workspace_config(temp.path(), &config).unwrap();
        assert!(path.ends_with(".routeprobe.json"));
        let loaded = load_workspace_config(temp.path()).unwrap().unwrap();
        assert_eq!(loaded, config);
    }
}
