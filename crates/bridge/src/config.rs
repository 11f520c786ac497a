use std::path::Path;

use relive_core::RouterConfig;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::message::topics;

/// Configuration for the agent bridge.
///
/// Parsed from `relive.toml`; `RELIVE_BRIDGE_ENDPOINT` and
/// `RELIVE_BRIDGE_TOPIC` override the file, and the nested `[router]`
/// section takes the usual `RELIVE_*` overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// ZeroMQ endpoint the agent's PUB socket binds.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Topic prefix to subscribe to.
    #[serde(default = "default_topic")]
    pub topic: String,

    #[serde(default)]
    pub router: RouterConfig,
}

fn default_endpoint() -> String {
    "tcp://127.0.0.1:5590".into()
}

fn default_topic() -> String {
    topics::CLASS_RELOADED.into()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            topic: default_topic(),
            router: RouterConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn from_toml(toml_str: &str) -> Result<Self, BridgeError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `RELIVE_BRIDGE_*` and router overrides from a key lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("RELIVE_BRIDGE_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = lookup("RELIVE_BRIDGE_TOPIC") {
            self.topic = v;
        }
        self.router.apply_overrides(lookup);
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if !(self.endpoint.starts_with("tcp://") || self.endpoint.starts_with("ipc://")) {
            return Err(BridgeError::Transport(format!(
                "invalid endpoint '{}', expected tcp:// or ipc://",
                self.endpoint
            )));
        }
        self.router.validate()?;
        Ok(())
    }
}
