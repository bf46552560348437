//! In-memory collaborators
//!
//! Used by the `telebridge run` command and by tests. None of these talk to
//! real equipment.

use anyhow::bail;
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::activity::{ActivityRequest, SchedulingRequest};
use crate::collaborators::{ActivityExecutor, ConnectorTransport, ParameterStore};
use crate::model::{EntityId, EntityKind, EntityResolver, ParameterSample, SystemModel, Value};

/// Parameter values held in a map
#[derive(Default)]
pub struct InMemoryParameterStore {
    values: Mutex<HashMap<EntityId, ParameterSample>>,
    commands: Mutex<Vec<(EntityId, Value)>>,
    fail_next_set: Mutex<Option<String>>,
}

impl InMemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed every parameter that declares an initial value
    pub fn seeded(model: &SystemModel, resolver: &EntityResolver) -> Self {
        let store = Self::new();
        {
            let mut values = store.values.lock();
            for definition in &model.entities {
                let Some(initial) = &definition.initial else {
                    continue;
                };
                if definition.kind != EntityKind::Parameter {
                    continue;
                }
                if let Ok(id) = resolver.resolve(&definition.path) {
                    values.insert(id, ParameterSample::new(id, initial.clone()));
                }
            }
        }
        store
    }

    /// Set commands received so far, oldest first
    pub fn commands(&self) -> Vec<(EntityId, Value)> {
        self.commands.lock().clone()
    }

    pub fn fail_next_set(&self, reason: impl Into<String>) {
        *self.fail_next_set.lock() = Some(reason.into());
    }
}

impl ParameterStore for InMemoryParameterStore {
    fn current(&self, id: EntityId) -> Option<ParameterSample> {
        self.values.lock().get(&id).cloned()
    }

    fn inject(&self, sample: &ParameterSample) -> anyhow::Result<()> {
        self.values.lock().insert(sample.id, sample.clone());
        Ok(())
    }

    fn set(&self, id: EntityId, value: &Value) -> anyhow::Result<()> {
        if let Some(reason) = self.fail_next_set.lock().take() {
            bail!(reason);
        }
        self.commands.lock().push((id, value.clone()));
        // Loopback: the command takes effect at once
        self.values
            .lock()
            .insert(id, ParameterSample::new(id, value.clone()));
        Ok(())
    }
}

#[derive(Default)]
struct LinkState {
    connected: bool,
    properties: BTreeMap<String, Value>,
    in_flight: usize,
    draining: bool,
    abort_requested: bool,
    fail_next_connect: Option<String>,
}

/// Connector transport with a simulated drain
///
/// `disconnect` blocks until in-flight work finishes (see
/// [`begin_work`](Self::begin_work)) and the configured drain delay has
/// passed; `abort` cuts the drain short.
#[derive(Default)]
pub struct LoopbackTransport {
    state: Mutex<LinkState>,
    changed: Condvar,
    drain_delay: Duration,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_drain_delay(drain_delay: Duration) -> Self {
        Self {
            drain_delay,
            ..Self::default()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// True while a `disconnect` call is blocked in the drain
    pub fn is_draining(&self) -> bool {
        self.state.lock().draining
    }

    pub fn properties(&self) -> BTreeMap<String, Value> {
        self.state.lock().properties.clone()
    }

    pub fn begin_work(&self) {
        self.state.lock().in_flight += 1;
    }

    pub fn finish_work(&self) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        self.changed.notify_all();
    }

    pub fn fail_next_connect(&self, reason: impl Into<String>) {
        self.state.lock().fail_next_connect = Some(reason.into());
    }
}

impl ConnectorTransport for LoopbackTransport {
    fn initialise(&self, properties: &BTreeMap<String, Value>) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.properties = properties.clone();
        state.abort_requested = false;
        Ok(())
    }

    fn connect(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        if let Some(reason) = state.fail_next_connect.take() {
            bail!(reason);
        }
        state.connected = true;
        state.abort_requested = false;
        Ok(())
    }

    fn disconnect(&self) -> anyhow::Result<()> {
        let deadline = Instant::now() + self.drain_delay;
        let mut state = self.state.lock();
        state.draining = true;
        while !state.abort_requested && (state.in_flight > 0 || Instant::now() < deadline) {
            if state.in_flight > 0 {
                self.changed.wait(&mut state);
            } else {
                self.changed.wait_until(&mut state, deadline);
            }
        }
        state.draining = false;
        state.connected = false;
        debug!(target: "connector", "Loopback drained (aborted: {})", state.abort_requested);
        Ok(())
    }

    fn abort(&self) {
        let mut state = self.state.lock();
        state.abort_requested = true;
        state.in_flight = 0;
        state.connected = false;
        self.changed.notify_all();
    }
}

/// Activity executor that records what it was asked to do
#[derive(Default)]
pub struct RecordingExecutor {
    started: Mutex<Vec<ActivityRequest>>,
    scheduled: Mutex<Vec<SchedulingRequest>>,
    cancelled: Mutex<Vec<String>>,
    fail_next_start: Mutex<Option<String>>,
    fail_next_cancel: Mutex<Option<String>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_start(&self, reason: impl Into<String>) {
        *self.fail_next_start.lock() = Some(reason.into());
    }

    pub fn fail_next_cancel(&self, reason: impl Into<String>) {
        *self.fail_next_cancel.lock() = Some(reason.into());
    }

    pub fn started(&self) -> Vec<ActivityRequest> {
        self.started.lock().clone()
    }

    pub fn scheduled(&self) -> Vec<SchedulingRequest> {
        self.scheduled.lock().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().clone()
    }
}

impl ActivityExecutor for RecordingExecutor {
    fn start(&self, request: &ActivityRequest) -> anyhow::Result<()> {
        if let Some(reason) = self.fail_next_start.lock().take() {
            bail!(reason);
        }
        self.started.lock().push(request.clone());
        Ok(())
    }

    fn schedule(&self, request: &SchedulingRequest) -> anyhow::Result<()> {
        self.scheduled.lock().push(request.clone());
        Ok(())
    }

    fn cancel_scheduled(&self, external_id: &str) -> anyhow::Result<()> {
        if let Some(reason) = self.fail_next_cancel.lock().take() {
            bail!(reason);
        }
        self.cancelled.lock().push(external_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityDefinition;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_store_seeded_from_model() {
        let model = SystemModel::new(vec![
            EntityDefinition::new("/sys/power/voltage", EntityKind::Parameter).with_initial(28.0),
            EntityDefinition::new("/sys/power/current", EntityKind::Parameter),
        ]);
        let resolver = EntityResolver::build(&model).unwrap();
        let store = InMemoryParameterStore::seeded(&model, &resolver);

        let voltage = resolver.resolve("/sys/power/voltage").unwrap();
        let current = resolver.resolve("/sys/power/current").unwrap();
        assert_eq!(store.current(voltage).unwrap().value, Value::Real(28.0));
        assert!(store.current(current).is_none());
    }

    #[test]
    fn test_abort_cuts_drain_short() {
        let transport = Arc::new(LoopbackTransport::with_drain_delay(Duration::from_secs(30)));
        transport.connect().unwrap();

        let drainer = {
            let transport = transport.clone();
            thread::spawn(move || transport.disconnect())
        };
        while !transport.is_draining() {
            thread::sleep(Duration::from_millis(2));
        }

        let start = Instant::now();
        transport.abort();
        drainer.join().unwrap().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!transport.is_connected());
    }
}
