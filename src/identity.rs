//! Fixed identity the bridge presents to the native application.
//!
//! These values are part of the wire contract: the native host's manifest must list
//! [`EXTENSION_ID`] in `allowed_extensions`, and the host is registered under
//! [`NATIVE_APP_ID`]. Change them only together with the host installer.

use serde::{Deserialize, Serialize};

/// Add-on ID the privileged context emulates.
pub const EXTENSION_ID: &str = "firefoxpwa@filips.si";

/// Name the native host manifest is registered under.
pub const NATIVE_APP_ID: &str = "firefoxpwa";

/// Manifest version reported by the emulated extension context.
pub const MANIFEST_VERSION: u8 = 2;

/// Environment type of the emulated extension context.
pub const ENV_TYPE: &str = "userChromeEnv";

/// Diagnostic channel name, `UserChrome/<extension>/sendNativeMessage/<app>`.
///
/// Used to tag encoded messages for log correlation. Never used for routing.
pub const CHANNEL_NAME: &str = "UserChrome/firefoxpwa@filips.si/sendNativeMessage/firefoxpwa";

/// The logical identity stamped on every call context.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Identity {
    pub extension_id: String,
    pub native_app_id: String,
    pub manifest_version: u8,
    pub env_type: String,
}

impl Identity {
    /// `UserChrome/<extension_id>/sendNativeMessage/<native_app_id>`
    pub fn channel_name(&self) -> String {
        format!(
            "UserChrome/{}/sendNativeMessage/{}",
            self.extension_id, self.native_app_id
        )
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            extension_id: EXTENSION_ID.to_string(),
            native_app_id: NATIVE_APP_ID.to_string(),
            manifest_version: MANIFEST_VERSION,
            env_type: ENV_TYPE.to_string(),
        }
    }
}
