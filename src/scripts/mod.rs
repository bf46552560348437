/// Built-in scripts
///
/// Small automation procedures that exercise the script manager and serve
/// as templates for site-specific scripts.
pub mod connector_bringup;
pub mod parameter_watch;

use crate::register_scripts;
use crate::scripting::ScriptRegistry;

/// Create a registry with all built-in scripts
pub fn create_registry() -> ScriptRegistry {
    let mut registry = ScriptRegistry::new();
    register_scripts!(
        registry,
        connector_bringup::ConnectorBringupScript,
        parameter_watch::ParameterWatchScript,
    );
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lists_builtins() {
        let registry = create_registry();
        assert_eq!(
            registry.available_scripts(),
            vec!["connector_bringup".to_string(), "parameter_watch".to_string()]
        );
        assert!(registry.create("nope").is_none());
    }
}
