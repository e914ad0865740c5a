// Copyright 2025 Chris Custine
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
//! Persistent settings are stored in TOML format via `confy`. Command-line
//! flags override individual values for a single run.

use std::path::PathBuf;
use std::time::Duration;

use flight_stream::{ClientConfig, ReconnectPolicy, TrackerConfig, DEFAULT_SERVER_URL};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const APP_NAME: &str = "flightwatch";
const CONFIG_NAME: &str = "config";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// WebSocket URL of the tracking feed
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// User id sent in the join request; generated and saved on first load
    #[serde(default)]
    pub user_id: String,

    /// Display name sent in the join request
    #[serde(default = "default_username")]
    pub username: String,

    /// Seconds to wait before reconnecting after an unexpected close
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Give up after this many consecutive failed reconnects (unset retries forever)
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,

    /// Seconds a takeoff or landed plane stays visible
    #[serde(default = "default_transient_window_secs")]
    pub transient_window_secs: u64,

    /// Seconds a crash marker stays visible
    #[serde(default = "default_crash_marker_window_secs")]
    pub crash_marker_window_secs: u64,

    /// Refuse to start a second local session for the same user id
    #[serde(default = "default_true")]
    pub single_session: bool,

    /// Seconds between status summaries (0 disables them)
    #[serde(default = "default_summary_interval_secs")]
    pub summary_interval_secs: u64,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_user_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn default_username() -> String {
    "flightwatch".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_transient_window_secs() -> u64 {
    10
}

fn default_crash_marker_window_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_summary_interval_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            server_url: default_server_url(),
            user_id: default_user_id(),
            username: default_username(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            max_reconnect_attempts: None,
            transient_window_secs: default_transient_window_secs(),
            crash_marker_window_secs: default_crash_marker_window_secs(),
            single_session: true,
            summary_interval_secs: default_summary_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, creating it with defaults on first run
    pub fn load() -> Result<Self, confy::ConfyError> {
        let mut config: Self = confy::load(APP_NAME, CONFIG_NAME)?;
        if config.ensure_user_id() {
            config.save()?;
        }
        Ok(config)
    }

    /// Fill in a generated user id if none is set. Returns `true` if one was
    /// generated and the config needs saving.
    pub fn ensure_user_id(&mut self) -> bool {
        if !self.user_id.trim().is_empty() {
            return false;
        }
        self.user_id = default_user_id();
        true
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, CONFIG_NAME, self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    /// Directory holding single-session lock files
    pub fn lock_dir() -> PathBuf {
        dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_NAME)
    }

    /// Build the client configuration for this app configuration
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.user_id.clone(), self.username.clone());
        config.connection.url.clone_from(&self.server_url);
        config.connection.reconnect = ReconnectPolicy {
            delay: Duration::from_secs(self.reconnect_delay_secs),
            max_attempts: self.max_reconnect_attempts,
        };
        config.tracker = TrackerConfig {
            transient_window: Duration::from_secs(self.transient_window_secs),
            crash_marker_window: Duration::from_secs(self.crash_marker_window_secs),
        };
        config.lock_dir = self.single_session.then(Self::lock_dir);
        config
    }
}
