use super::manager::ScriptManager;

/// Trait that all scripts must implement
///
/// A script runs once, top to bottom, on its own thread. It talks to the
/// monitored system only through the [`ScriptManager`] it is handed.
pub trait Script: Send + 'static {
    /// Unique identifier for this script (e.g., "connector_bringup")
    fn id(&self) -> &'static str;

    /// Human-readable name for this script
    fn name(&self) -> &'static str;

    /// Description of what this script does
    fn description(&self) -> &'static str;

    /// Apply the script's `[scripting.config.<id>]` table before it runs
    fn configure(&mut self, _config: &toml::Value) -> anyhow::Result<()> {
        Ok(())
    }

    fn run(&mut self, manager: &dyn ScriptManager) -> anyhow::Result<()>;
}
