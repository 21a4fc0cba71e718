//! Process-wide bridge configuration.
//!
//! The built-in configuration is embedded from `bridge.toml`. A deployment can point
//! `NATIVE_BRIDGE_CONFIG` at a file with the same layout; it is read once, the first
//! time [`BridgeConfig::global`] is used, and never changes afterwards. An override
//! that cannot be read or parsed is never replaced by the defaults: every later
//! [`BridgeConfig::global`] call reports it as a setup error.

use std::{ffi::OsString, fs, path::Path, time::Duration};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, ConfigError};
use crate::identity::Identity;

/// Environment variable naming an override config file.
pub const CONFIG_ENV: &str = "NATIVE_BRIDGE_CONFIG";

const BUILTIN: &str = include_str!("bridge.toml");

static GLOBAL: Lazy<Result<BridgeConfig, ConfigError>> = Lazy::new(|| {
    let loaded = load_process_config(std::env::var_os(CONFIG_ENV));
    if let Err(err) = &loaded {
        tracing::error!(error = %err, "bridge config could not be loaded");
    }
    loaded
});

fn load_process_config(override_path: Option<OsString>) -> Result<BridgeConfig, ConfigError> {
    match override_path {
        Some(path) => BridgeConfig::load(Path::new(&path)),
        None => BridgeConfig::from_toml_str(BUILTIN),
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    pub identity: Identity,
    pub limits: Limits,
    pub stdio: StdioSettings,
}

/// Size and shape bounds applied at the clone boundary and on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Limits {
    pub max_outgoing_bytes: usize,
    pub max_incoming_bytes: usize,
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_outgoing_bytes: 64 * 1_048_576,
            max_incoming_bytes: 1_048_576,
            max_depth: 64,
        }
    }
}

/// Knobs for the process transport. Ignored by other transports.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StdioSettings {
    pub shutdown_grace_ms: u64,
    pub reply_timeout_ms: Option<u64>,
}

impl StdioSettings {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for StdioSettings {
    fn default() -> Self {
        Self {
            shutdown_grace_ms: 3000,
            reply_timeout_ms: None,
        }
    }
}

impl BridgeConfig {
    /// The configuration shared by the process-wide broker.
    ///
    /// Fails with [`BridgeError::Setup`] when the `NATIVE_BRIDGE_CONFIG` override could
    /// not be loaded.
    pub fn global() -> crate::error::Result<&'static BridgeConfig> {
        GLOBAL
            .as_ref()
            .map_err(|err| BridgeError::setup(format!("bridge config unusable: {err}")))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }
}
