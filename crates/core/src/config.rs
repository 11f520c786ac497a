use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default notification name injection agents post on.
pub const DEFAULT_NOTIFICATION_NAME: &str = "INJECTION_BUNDLE_NOTIFICATION";

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Parse a boolean-ish env value (`1/true/yes/on`, `0/false/no/off`).
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ── Router config ─────────────────────────────────────────────

/// Settings for the reload router.
///
/// Parsed from TOML with support for `RELIVE_*` environment overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// When false the router stays inert: registrations are kept but
    /// dispatch never invokes callbacks.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bus event name the router subscribes to.
    #[serde(default = "default_notification_name")]
    pub notification_name: String,

    /// Notify a candidate when one of its direct children's class reloads.
    #[serde(default = "default_true")]
    pub escalate_to_parents: bool,

    /// Drop candidates whose host is gone after each dispatch pass.
    #[serde(default = "default_true")]
    pub prune_dead_hosts: bool,
}

fn default_true() -> bool {
    true
}

fn default_notification_name() -> String {
    DEFAULT_NOTIFICATION_NAME.into()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            notification_name: default_notification_name(),
            escalate_to_parents: true,
            prune_dead_hosts: true,
        }
    }
}

impl RouterConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Build config from defaults plus environment (loads `.env` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// - `RELIVE_ENABLED` → `enabled`
    /// - `RELIVE_NOTIFICATION_NAME` → `notification_name`
    /// - `RELIVE_ESCALATE_TO_PARENTS` → `escalate_to_parents`
    /// - `RELIVE_PRUNE_DEAD_HOSTS` → `prune_dead_hosts`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Unparseable booleans
    /// are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let flag = |key: &str, slot: &mut bool| {
            if let Some(raw) = lookup(key) {
                match parse_bool(&raw) {
                    Some(v) => *slot = v,
                    None => tracing::warn!(key, value = %raw, "ignoring non-boolean override"),
                }
            }
        };
        flag("RELIVE_ENABLED", &mut self.enabled);
        flag("RELIVE_ESCALATE_TO_PARENTS", &mut self.escalate_to_parents);
        flag("RELIVE_PRUNE_DEAD_HOSTS", &mut self.prune_dead_hosts);

        if let Some(name) = lookup("RELIVE_NOTIFICATION_NAME") {
            self.notification_name = name;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notification_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "notification_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
