//! Persistent configuration for arbridge.
//!
//! Stores user settings in `~/.arbridge/config.json`: where the automation
//! server lives, which capabilities to open the session with, which element
//! carries the coordinate probe, and the run timings. Every field has a
//! default, so a missing or partial file is fine.
//!
//! # Example
//!
//! ```no_run
//! use arbridge_core::config::ArBridgeConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = ArBridgeConfig::load();
//! println!("Driver at {}", config.server_url);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::bridge::{BridgeTiming, DEFAULT_PROBE_SELECTOR};

const CONFIG_FILENAME: &str = "config.json";

/// Default address of a local Appium server.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:4723";

/// Returns the arbridge data directory (`~/.arbridge/`), creating it if
/// needed. Falls back to the current directory when there is no home.
pub fn arbridge_dir() -> PathBuf {
    let dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".arbridge");
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Default path of the configuration file.
pub fn default_config_path() -> PathBuf {
    arbridge_dir().join(CONFIG_FILENAME)
}

/// A configuration that loaded fine but cannot drive a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("probe selector is empty")]
    EmptySelector,

    #[error("timing.{field} must be greater than zero")]
    ZeroTiming { field: &'static str },
}

/// Timings of the walkthrough, serialized in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How long the probe may take to appear at all.
    pub presence_timeout_ms: u64,
    /// Pause between probe reads.
    pub poll_interval_ms: u64,
    /// Timeout of the first coordinate read after placement.
    pub initial_read_timeout_ms: u64,
    /// Timeout of the re-reads after reset, move and grow.
    pub followup_read_timeout_ms: u64,
    /// Pause between a gesture and its "after" screenshot.
    pub step_grace_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            presence_timeout_ms: 5_000,
            poll_interval_ms: 500,
            initial_read_timeout_ms: 20_000,
            followup_read_timeout_ms: 10_000,
            step_grace_ms: 2_000,
        }
    }
}

impl TimingConfig {
    pub fn bridge(&self) -> BridgeTiming {
        BridgeTiming {
            presence_timeout: Duration::from_millis(self.presence_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn initial_read_timeout(&self) -> Duration {
        Duration::from_millis(self.initial_read_timeout_ms)
    }

    pub fn followup_read_timeout(&self) -> Duration {
        Duration::from_millis(self.followup_read_timeout_ms)
    }

    pub fn step_grace(&self) -> Duration {
        Duration::from_millis(self.step_grace_ms)
    }

    /// Rejects timings under which the bridge could never read anything.
    /// A zero window or interval would end the poll before the first read.
    /// `step_grace_ms` may be zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let windows = [
            ("presence_timeout_ms", self.presence_timeout_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("initial_read_timeout_ms", self.initial_read_timeout_ms),
            ("followup_read_timeout_ms", self.followup_read_timeout_ms),
        ];
        match windows.iter().find(|(_, ms)| *ms == 0) {
            Some(&(field, _)) => Err(ConfigError::ZeroTiming { field }),
            None => Ok(()),
        }
    }
}

/// Persistent arbridge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArBridgeConfig {
    /// Base URL of the WebDriver / Appium server.
    pub server_url: String,
    /// Capabilities sent as `alwaysMatch` when opening the session.
    pub capabilities: Map<String, Value>,
    /// CSS selector of the coordinate probe element.
    pub probe_selector: String,
    /// Directory audit screenshots are written to.
    pub screenshot_dir: PathBuf,
    pub timing: TimingConfig,
}

impl Default for ArBridgeConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            capabilities: default_capabilities(),
            probe_selector: DEFAULT_PROBE_SELECTOR.to_string(),
            screenshot_dir: PathBuf::from("."),
            timing: TimingConfig::default(),
        }
    }
}

/// Capabilities for attaching to an already running Android app without
/// resetting it.
pub fn default_capabilities() -> Map<String, Value> {
    let caps = json!({
        "platformName": "Android",
        "appium:automationName": "UiAutomator2",
        "appium:noReset": true,
        "appium:dontStopAppOnReset": true,
    });
    match caps {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl ArBridgeConfig {
    /// Load config from `~/.arbridge/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&default_config_path()).unwrap_or_default()
    }

    /// Load config from an explicit path.
    ///
    /// Unlike [`load`](Self::load), a missing or malformed file is an error.
    pub fn load_from(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Checks that this config can drive a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_selector.trim().is_empty() {
            return Err(ConfigError::EmptySelector);
        }
        self.timing.validate()
    }

    /// Save config to `path`.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}
