use std::fs;
use std::sync::Arc;
use std::time::Duration;

use telebridge::config::{BridgeConfig, ConfigLoadError};
use telebridge::connector::ConnectorState;
use telebridge::loopback::LoopbackTransport;
use telebridge::model::{EntityKind, SystemModel, Value};
use telebridge::scripting::{ScriptEngine, ScriptManager, ScriptOutcome, ScriptRunner};
use telebridge::scripts::create_registry;

const MODEL: &str = r#"
[[entity]]
path = "/sys/power/bus_voltage"
kind = "parameter"
initial = 28.0

[[entity]]
path = "/sys/power/undervoltage"
kind = "event"
description = "Bus voltage below threshold"
"#;

const CONFIG: &str = r#"
model = "model.toml"

[connectors.tm-link]
description = "Telemetry link"
properties = { host = "gs1.local", port = 7000 }

[scripting]
enabled_scripts = ["connector_bringup"]

[scripting.config.connector_bringup]
connectors = ["tm-link"]
properties = { port = 7100 }
"#;

#[test]
fn test_missing_files_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        BridgeConfig::load_from(&dir.path().join("absent.toml")),
        Err(ConfigLoadError::NotFound)
    ));
    assert!(matches!(
        SystemModel::load(&dir.path().join("absent.toml")),
        Err(ConfigLoadError::NotFound)
    ));
}

#[test]
fn test_malformed_model_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.toml");
    fs::write(&path, "[[entity]]\npath = 3\n").unwrap();
    assert!(matches!(
        SystemModel::load(&path),
        Err(ConfigLoadError::ParseError(_))
    ));
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let config = BridgeConfig::from_toml(CONFIG).unwrap();

    let path = dir.path().join("nested").join("config.toml");
    config.save_to(&path).unwrap();
    assert_eq!(BridgeConfig::load_from(&path).unwrap(), config);
}

#[test]
fn test_configured_bringup_runs_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("model.toml"), MODEL).unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, CONFIG).unwrap();

    let config = BridgeConfig::load_from(&config_path).unwrap();
    let model_path = dir.path().join(config.model.clone().unwrap());
    let model = SystemModel::load(&model_path).unwrap();
    assert_eq!(model.entities[1].kind, EntityKind::Event);

    let transport = Arc::new(LoopbackTransport::new());
    let link = &config.connectors["tm-link"];
    let engine = ScriptEngine::builder(model)
        .waits(config.waits.clone())
        .connector(
            "tm-link",
            link.description.clone(),
            link.properties.clone(),
            transport.clone(),
        )
        .build()
        .unwrap();

    let registry = create_registry();
    let scripts = registry.create_scripts(&config.scripting.enabled_scripts, &config.scripting);
    assert_eq!(scripts.len(), 1);

    let mut runner = ScriptRunner::new(engine.clone());
    for script in scripts {
        runner.start(script).unwrap();
    }
    assert_eq!(
        runner.join_all(),
        vec![("connector_bringup".to_string(), ScriptOutcome::Completed)]
    );

    assert_eq!(
        engine.connectors().status("tm-link").unwrap(),
        ConnectorState::Running
    );
    let applied = transport.properties();
    assert_eq!(applied.get("host"), Some(&Value::from("gs1.local")));
    assert_eq!(applied.get("port"), Some(&Value::Integer(7100)));

    let session = engine.session("check");
    assert_eq!(
        session
            .parameter("/sys/power/bus_voltage")
            .unwrap()
            .unwrap()
            .value,
        Value::Real(28.0)
    );
    assert!(session
        .wait_for_event("/sys/power/undervoltage", Duration::ZERO)
        .unwrap()
        .is_timed_out());
}
