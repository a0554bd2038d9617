use thiserror::Error;

/// Top-level error type for the assistant client.
///
/// Covers configuration and local I/O. Request failures against the backend
/// live in `assistant-client` and never abort the application.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssistantError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid setting {name}: {value} (expected {expected})")]
    InvalidSetting {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Unknown setting: {0}")]
    UnknownSetting(String),
}

impl From<toml::de::Error> for AssistantError {
    fn from(err: toml::de::Error) -> Self {
        AssistantError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AssistantError {
    fn from(err: toml::ser::Error) -> Self {
        AssistantError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AssistantError {
    fn from(err: serde_json::Error) -> Self {
        AssistantError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for assistant operations.
pub type Result<T> = std::result::Result<T, AssistantError>;
