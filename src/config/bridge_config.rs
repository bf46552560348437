use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    activity_config::ActivityConfig, connector_config::ConnectorConfig, paths::ProjectPaths,
    scripting_config::ScriptingConfig, wait_config::WaitConfig, ConfigLoadError,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to a file under the data directory
    #[serde(default)]
    pub file: bool,
}

/// Top-level `config.toml`
///
/// ```toml
/// model = "/etc/telebridge/model.toml"
///
/// [waits]
/// parameter_wake = "value_change"
/// max_wait_secs = 600
///
/// [activities]
/// retained = 256
///
/// [connectors.tm-link]
/// description = "Telemetry frames from the ground station"
/// properties = { host = "gs1.local", port = 7000 }
///
/// [scripting]
/// enabled_scripts = ["connector_bringup"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// System model file
    #[serde(default)]
    pub model: Option<PathBuf>,

    #[serde(default)]
    pub waits: WaitConfig,

    #[serde(default)]
    pub activities: ActivityConfig,

    #[serde(default)]
    pub connectors: BTreeMap<String, ConnectorConfig>,

    #[serde(default)]
    pub scripting: ScriptingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Default location, `None` without a home directory
    pub fn config_path() -> Option<PathBuf> {
        ProjectPaths::new("telebridge").map(|p| p.config_dir().join("config.toml"))
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigLoadError> {
        toml::from_str(content).map_err(|e| ConfigLoadError::ParseError(e.to_string()))
    }

    pub fn load() -> Result<Self, ConfigLoadError> {
        let path = Self::config_path().ok_or(ConfigLoadError::NotFound)?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigLoadError> {
        if !path.exists() {
            return Err(ConfigLoadError::NotFound);
        }

        let content =
            fs::read_to_string(path).map_err(|e| ConfigLoadError::IoError(e.to_string()))?;
        let config = Self::from_toml(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(&self)?;
        fs::write(path, content)?;
        info!("Saved config to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ParameterWakePolicy;
    use crate::model::Value;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = BridgeConfig::from_toml("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert!(config.scripting.enabled);
        assert_eq!(
            config.waits.parameter_wake,
            ParameterWakePolicy::EverySample
        );
    }

    #[test]
    fn test_full_config() {
        let config = BridgeConfig::from_toml(
            r#"
            model = "model.toml"

            [waits]
            parameter_wake = "value_change"
            max_wait_secs = 30

            [activities]
            retained = 32

            [connectors.tm-link]
            description = "Telemetry"
            properties = { host = "gs1.local", port = 7000 }
            drain_ms = 250

            [scripting]
            enabled_scripts = ["parameter_watch"]

            [scripting.config.parameter_watch]
            path = "/sys/power/voltage"

            [logging]
            file = true
            "#,
        )
        .unwrap();

        assert_eq!(config.model, Some(PathBuf::from("model.toml")));
        assert_eq!(config.waits.max_wait_secs, Some(30));
        assert_eq!(config.activities.retained, 32);
        let link = &config.connectors["tm-link"];
        assert_eq!(link.properties.get("port"), Some(&Value::Integer(7000)));
        assert_eq!(link.drain_ms, 250);
        assert_eq!(config.scripting.enabled_scripts, vec!["parameter_watch"]);
        assert!(config.scripting.script_config("parameter_watch").is_some());
        assert!(config.logging.file);
    }

    #[test]
    fn test_parse_error() {
        let err = BridgeConfig::from_toml("waits = 3").unwrap_err();
        assert!(matches!(err, ConfigLoadError::ParseError(_)));
    }
}
