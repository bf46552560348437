use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scripts started when none are named on the command line
    #[serde(default)]
    pub enabled_scripts: Vec<String>,

    /// Per-script configuration (script ID -> config values)
    #[serde(default)]
    pub config: HashMap<String, toml::Value>,
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enabled_scripts: Vec::new(),
            config: HashMap::new(),
        }
    }
}

impl ScriptingConfig {
    pub fn script_config(&self, script_id: &str) -> Option<&toml::Value> {
        self.config.get(script_id)
    }
}
