// Copyright 2025 The Hagelradar Authors
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

//! Application configuration management.
//!
//! Persistent view preferences stored in TOML format. Feed data is never
//! persisted; only the handful of settings a user would expect to survive a
//! restart live here.

use serde::{Deserialize, Serialize};

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    /// Startup map zoom level (5.0 - 12.0)
    #[serde(default = "default_zoom")]
    pub default_zoom: f32,

    /// Show observation markers on the map
    #[serde(default = "default_true")]
    pub show_observations: bool,

    /// Probability layer fill opacity (0.0 - 1.0)
    #[serde(default = "default_overlay_opacity")]
    pub overlay_opacity: f32,
}

// Default value functions for serde
fn default_zoom() -> f32 {
    8.0
}

fn default_true() -> bool {
    true
}

fn default_overlay_opacity() -> f32 {
    0.7
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_zoom: default_zoom(),
            show_observations: true,
            overlay_opacity: default_overlay_opacity(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load("hagelradar-desktop", "config")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store("hagelradar-desktop", "config", self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path("hagelradar-desktop", "config")
    }
}
