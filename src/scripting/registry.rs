use std::collections::HashMap;
use tracing::{debug, error, warn};

use super::script::Script;
use crate::config::ScriptingConfig;

/// Factory function type for creating script instances
pub type ScriptFactory = fn() -> Box<dyn Script>;

/// Registry of available scripts
pub struct ScriptRegistry {
    factories: HashMap<String, ScriptFactory>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, id: impl Into<String>, factory: ScriptFactory) {
        let id = id.into();
        debug!(target: "scripting", "Registering script factory: {}", id);
        self.factories.insert(id, factory);
    }

    pub fn create(&self, id: &str) -> Option<Box<dyn Script>> {
        self.factories.get(id).map(|factory| factory())
    }

    /// Instantiate and configure each known script in `ids`
    ///
    /// Unknown ids and scripts that reject their configuration are logged and
    /// skipped.
    pub fn create_scripts(&self, ids: &[String], config: &ScriptingConfig) -> Vec<Box<dyn Script>> {
        let mut scripts = Vec::new();

        for script_id in ids {
            let Some(mut script) = self.create(script_id) else {
                warn!(target: "scripting", "Unknown script ID: {}", script_id);
                continue;
            };

            if let Some(script_config) = config.script_config(script_id) {
                if let Err(e) = script.configure(script_config) {
                    error!(
                        target: "scripting",
                        "Script {} rejected its configuration: {:#}",
                        script_id, e
                    );
                    continue;
                }
            }

            debug!(target: "scripting", "Creating script instance: {}", script_id);
            scripts.push(script);
        }

        scripts
    }

    /// All registered script IDs, sorted
    pub fn available_scripts(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for ScriptRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Macro to register multiple scripts at once
///
/// # Example
/// ```ignore
/// let mut registry = ScriptRegistry::new();
/// register_scripts!(registry, ConnectorBringupScript, ParameterWatchScript);
/// ```
#[macro_export]
macro_rules! register_scripts {
    ($registry:expr, $($script:ty),+ $(,)?) => {
        $(
            $registry.register(
                <$script as $crate::scripting::Script>::id(&<$script>::default()),
                || Box::new(<$script>::default()),
            );
        )+
    };
}
