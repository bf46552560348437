use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::connector::ConnectorState;
use crate::model::Value;
use crate::scripting::{Script, ScriptManager};

#[derive(Debug, Clone, Deserialize)]
struct BringupConfig {
    #[serde(default = "default_connectors")]
    connectors: Vec<String>,
    /// Properties applied to every connector on init
    #[serde(default)]
    properties: BTreeMap<String, Value>,
}

fn default_connectors() -> Vec<String> {
    vec!["tm-link".to_string()]
}

impl Default for BringupConfig {
    fn default() -> Self {
        Self {
            connectors: default_connectors(),
            properties: BTreeMap::new(),
        }
    }
}

/// Initialises and starts connectors that are not already running
#[derive(Default)]
pub struct ConnectorBringupScript {
    config: BringupConfig,
}

impl ConnectorBringupScript {
    fn bring_up(&self, manager: &dyn ScriptManager, name: &str) -> anyhow::Result<()> {
        match manager.connector_status(name)? {
            ConnectorState::Running => {
                manager.info(&format!("{} already running", name))?;
                return Ok(());
            }
            ConnectorState::Initialized => {}
            state => {
                if state == ConnectorState::Aborted {
                    manager.warning(&format!("{} was aborted, re-initialising", name))?;
                }
                let (keys, values): (Vec<String>, Vec<Value>) = self
                    .config
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .unzip();
                manager.init_connector(name, &keys, &values)?;
            }
        }

        manager.start_connector(name)?;
        manager.info(&format!("{} started", name))?;
        Ok(())
    }
}

impl Script for ConnectorBringupScript {
    fn id(&self) -> &'static str {
        "connector_bringup"
    }

    fn name(&self) -> &'static str {
        "Connector Bring-up"
    }

    fn description(&self) -> &'static str {
        "Initialises and starts the configured connectors"
    }

    fn configure(&mut self, config: &toml::Value) -> anyhow::Result<()> {
        self.config = config
            .clone()
            .try_into()
            .context("invalid connector_bringup config")?;
        Ok(())
    }

    fn run(&mut self, manager: &dyn ScriptManager) -> anyhow::Result<()> {
        for name in &self.config.connectors {
            self.bring_up(manager, name)
                .with_context(|| format!("bringing up {}", name))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::MockScriptManager;

    #[test]
    fn test_inits_then_starts() {
        let mut script = ConnectorBringupScript::default();
        script
            .configure(&toml::from_str("properties = { port = 7000 }").unwrap())
            .unwrap();

        let mut mock = MockScriptManager::new();
        mock.expect_connector_status()
            .withf(|name| name == "tm-link")
            .times(1)
            .returning(|_| Ok(ConnectorState::Stopped));
        mock.expect_init_connector()
            .withf(|name, keys, values| {
                name == "tm-link"
                    && keys == ["port".to_string()]
                    && values == [Value::Integer(7000)]
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        mock.expect_start_connector()
            .times(1)
            .returning(|_| Ok(()));
        mock.expect_info().returning(|_| Ok(()));

        script.run(&mock).unwrap();
    }

    #[test]
    fn test_running_connector_left_alone() {
        let mut script = ConnectorBringupScript::default();
        let mut mock = MockScriptManager::new();
        mock.expect_connector_status()
            .returning(|_| Ok(ConnectorState::Running));
        mock.expect_init_connector().never();
        mock.expect_start_connector().never();
        mock.expect_info().times(1).returning(|_| Ok(()));

        script.run(&mock).unwrap();
    }

    #[test]
    fn test_start_failure_propagates() {
        let mut script = ConnectorBringupScript::default();
        let mut mock = MockScriptManager::new();
        mock.expect_connector_status()
            .returning(|_| Ok(ConnectorState::Initialized));
        mock.expect_start_connector().returning(|name| {
            Err(crate::BridgeError::InvalidState(format!("{} busy", name)))
        });

        let err = script.run(&mock).unwrap_err();
        assert!(format!("{:#}", err).contains("tm-link busy"));
    }
}
