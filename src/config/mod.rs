//! Configuration file handling
pub mod activity_config;
pub mod bridge_config;
pub mod connector_config;
pub mod paths;
pub mod scripting_config;
pub mod wait_config;

pub use activity_config::ActivityConfig;
pub use bridge_config::{BridgeConfig, LoggingConfig};
pub use connector_config::ConnectorConfig;
pub use paths::ProjectPaths;
pub use scripting_config::ScriptingConfig;
pub use wait_config::WaitConfig;

#[derive(Debug)]
pub enum ConfigLoadError {
    NotFound,
    ParseError(String),
    IoError(String),
}

impl std::fmt::Display for ConfigLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigLoadError::NotFound => write!(f, "file not found"),
            ConfigLoadError::ParseError(msg) => write!(f, "failed to parse TOML: {}", msg),
            ConfigLoadError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigLoadError {}
