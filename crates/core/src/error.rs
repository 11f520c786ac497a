use thiserror::Error;

/// Failure reported by a host's reload callback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReloadError {
    #[error("reload callback failed: {0}")]
    Callback(String),

    #[error("reload callback panicked: {0}")]
    Panicked(String),
}

impl ReloadError {
    pub fn callback(message: impl Into<String>) -> Self {
        Self::Callback(message.into())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
