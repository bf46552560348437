#![allow(dead_code)]

// Shared fixtures for integration tests
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use telebridge::loopback::{InMemoryParameterStore, LoopbackTransport, RecordingExecutor};
use telebridge::model::{EntityDefinition, EntityKind, EntityResolver, SystemModel};
use telebridge::scripting::{EngineBuilder, ScriptEngine};

pub struct Fixture {
    pub engine: Arc<ScriptEngine>,
    pub executor: Arc<RecordingExecutor>,
    pub store: Arc<InMemoryParameterStore>,
    pub link: Arc<LoopbackTransport>,
}

pub fn power_model() -> SystemModel {
    SystemModel::new(vec![
        EntityDefinition::new("/sys", EntityKind::Container),
        EntityDefinition::new("/sys/power/voltage", EntityKind::Parameter).with_initial(28.0),
        EntityDefinition::new("/sys/power/undervolt", EntityKind::Event),
        EntityDefinition::new("/sys/power/switch_on", EntityKind::Activity),
    ])
}

pub fn fixture() -> Fixture {
    fixture_with(|builder| builder)
}

pub fn fixture_with(
    configure: impl FnOnce(EngineBuilder) -> EngineBuilder,
) -> Fixture {
    let model = power_model();
    let resolver = EntityResolver::build(&model).unwrap();
    let store = Arc::new(InMemoryParameterStore::seeded(&model, &resolver));
    let executor = Arc::new(RecordingExecutor::new());
    let link = Arc::new(LoopbackTransport::new());

    let builder = ScriptEngine::builder(model)
        .parameter_store(store.clone())
        .activity_executor(executor.clone())
        .connector("X", None, BTreeMap::new(), link.clone());
    let engine = configure(builder).build().unwrap();

    Fixture {
        engine,
        executor,
        store,
        link,
    }
}

/// Spin until `condition` holds, failing the test after five seconds
pub fn wait_until(mut condition: impl FnMut() -> bool) {
    let start = Instant::now();
    while !condition() {
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "condition not reached in time"
        );
        thread::sleep(Duration::from_millis(2));
    }
}
