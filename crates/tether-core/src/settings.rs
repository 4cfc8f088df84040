#![forbid(unsafe_code)]

//! Engine-wide settings.
//!
//! Settings come from a TOML document ([`EngineSettings::from_toml_str`],
//! behind the `settings-file` feature) or from the environment
//! ([`EngineSettings::from_env`]):
//!
//! | Field | Variable | Default |
//! |-------|----------|---------|
//! | `key_prefix` | `TETHER_KEY_PREFIX` | `""` |
//! | `log_done` | `TETHER_LOG_DONE` | `false` |

use serde::Deserialize;

use crate::error::SettingsError;

/// Environment variable for [`EngineSettings::key_prefix`].
pub const KEY_PREFIX_VAR: &str = "TETHER_KEY_PREFIX";
/// Environment variable for [`EngineSettings::log_done`].
pub const LOG_DONE_VAR: &str = "TETHER_LOG_DONE";

/// Defaults applied to every binding of an engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    /// Prefix prepended to every key that does not set its own.
    pub key_prefix: String,
    /// Emit a `debug!` event for every successful operation.
    pub log_done: bool,
}

impl EngineSettings {
    /// Parse settings from a TOML document.
    #[cfg(feature = "settings-file")]
    pub fn from_toml_str(source: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(source)?)
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_vars(
            std::env::var(KEY_PREFIX_VAR).ok().as_deref(),
            std::env::var(LOG_DONE_VAR).ok().as_deref(),
        )
    }

    /// Build settings from raw variable values. Unset variables keep defaults.
    pub fn from_vars(key_prefix: Option<&str>, log_done: Option<&str>) -> Result<Self, SettingsError> {
        let mut settings = Self::default();
        if let Some(prefix) = key_prefix {
            settings.key_prefix = prefix.to_owned();
        }
        if let Some(raw) = log_done {
            settings.log_done = parse_flag(raw).ok_or_else(|| SettingsError::InvalidVar {
                var: LOG_DONE_VAR,
                value: raw.to_owned(),
            })?;
        }
        Ok(settings)
    }

    /// Replace the key prefix.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Enable or disable logging of successful operations.
    #[must_use]
    pub fn with_log_done(mut self, enabled: bool) -> Self {
        self.log_done = enabled;
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
