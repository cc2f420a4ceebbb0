// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Loading of the TOML settings file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use translux_agents::RenderSettings;

/// Environment variable overriding the settings file location.
pub const CONFIG_ENV: &str = "TRANSLUX_CONFIG";

/// Settings file read from the working directory by default.
pub const DEFAULT_CONFIG_FILE: &str = "translux.toml";

/// Path of the settings file for this run.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Reads settings from `path`.
///
/// A missing file yields the defaults. A file that exists but does not
/// parse is an error.
pub fn load_settings_from(path: &Path) -> Result<RenderSettings> {
    if !path.exists() {
        log::info!("No settings file at {}, using defaults", path.display());
        return Ok(RenderSettings::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let settings: RenderSettings =
        toml::from_str(&text).with_context(|| format!("malformed settings in {}", path.display()))?;
    log::info!("Loaded settings from {}", path.display());
    Ok(settings)
}
