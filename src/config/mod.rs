// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for probes.
//!
//! Configuration is read from the first source found:
//! - Workspace config: .routeprobe.json, .routeprobe.yaml, .routeprobe.yml,
//!   or routeprobe.config.json
//! - Global config: ~/.routeprobe/config.json
//! - Built-in defaults
//!
//! An explicit file passed to [`load_config_from`] bypasses the search.

mod loader;
mod types;

pub use loader::{
    get_global_config_path, load_config_file, load_global_config, load_workspace_config,
    save_workspace_config, CONFIG_FILES, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE,
};
pub use types::ProbeConfig;

use crate::error::ConfigError;
use std::path::Path;

/// Load probe configuration for a workspace.
pub fn load_config(workspace_root: &Path) -> Result<ProbeConfig, ConfigError> {
    if let Some(config) = load_workspace_config(workspace_root)? {
        return Ok(config);
    }
    Ok(load_global_config()?.unwrap_or_default())
}

/// Load configuration from `path` if given, otherwise search `workspace_root`.
pub fn load_config_from(
    path: Option<&Path>,
    workspace_root: &Path,
) -> Result<ProbeConfig, ConfigError> {
    match path {
        Some(path) => load_config_file(path),
        None => load_config(workspace_root),
    }
}
