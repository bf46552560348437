use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use super::{EntityKind, Value};
use crate::config::ConfigLoadError;

/// One entity as declared in the system model file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub path: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub description: Option<String>,
    /// Starting value for parameters
    #[serde(default)]
    pub initial: Option<Value>,
}

impl EntityDefinition {
    pub fn new(path: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            path: path.into(),
            kind,
            description: None,
            initial: None,
        }
    }

    pub fn with_initial(mut self, value: impl Into<Value>) -> Self {
        self.initial = Some(value.into());
        self
    }
}

/// The monitored system's entity model, as loaded from TOML
///
/// ```toml
/// [[entity]]
/// path = "/sys/power/bus_voltage"
/// kind = "parameter"
/// initial = 28.0
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemModel {
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntityDefinition>,
}

impl SystemModel {
    pub fn new(entities: Vec<EntityDefinition>) -> Self {
        Self { entities }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigLoadError> {
        toml::from_str(content).map_err(|e| ConfigLoadError::ParseError(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        if !path.exists() {
            return Err(ConfigLoadError::NotFound);
        }

        let content =
            fs::read_to_string(path).map_err(|e| ConfigLoadError::IoError(e.to_string()))?;
        let model = Self::from_toml(&content)?;
        info!(
            "Loaded system model from {} ({} entities)",
            path.display(),
            model.entities.len()
        );
        Ok(model)
    }
}
