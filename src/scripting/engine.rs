use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::{AbortSignal, ScriptSession};
use crate::activity::{ActivityDispatcher, ActivityInvocationId, ActivityState};
use crate::collaborators::{
    ActivityExecutor, ConnectorTransport, OperationalLog, ParameterStore, TracingLog,
};
use crate::config::{ActivityConfig, WaitConfig};
use crate::connector::{ConnectorRegistry, ConnectorState};
use crate::enablement::{EnablementFlag, EnablementRegistry};
use crate::error::Result;
use crate::events::EventBus;
use crate::loopback::{InMemoryParameterStore, RecordingExecutor};
use crate::model::{EntityId, EntityResolver, EventOccurrence, ParameterSample, SystemModel, Value};

struct PendingConnector {
    name: String,
    description: Option<String>,
    defaults: BTreeMap<String, Value>,
    transport: Arc<dyn ConnectorTransport>,
}

/// Assembles a [`ScriptEngine`]
///
/// Collaborators left unset fall back to the loopback implementations and a
/// tracing-backed operational log.
pub struct EngineBuilder {
    model: SystemModel,
    store: Option<Arc<dyn ParameterStore>>,
    executor: Option<Arc<dyn ActivityExecutor>>,
    log: Option<Arc<dyn OperationalLog>>,
    waits: WaitConfig,
    activities: ActivityConfig,
    connectors: Vec<PendingConnector>,
}

impl EngineBuilder {
    pub fn parameter_store(mut self, store: Arc<dyn ParameterStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn activity_executor(mut self, executor: Arc<dyn ActivityExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn operational_log(mut self, log: Arc<dyn OperationalLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn waits(mut self, waits: WaitConfig) -> Self {
        self.waits = waits;
        self
    }

    pub fn activities(mut self, activities: ActivityConfig) -> Self {
        self.activities = activities;
        self
    }

    pub fn connector(
        mut self,
        name: impl Into<String>,
        description: Option<String>,
        defaults: BTreeMap<String, Value>,
        transport: Arc<dyn ConnectorTransport>,
    ) -> Self {
        self.connectors.push(PendingConnector {
            name: name.into(),
            description,
            defaults,
            transport,
        });
        self
    }

    /// Fails on duplicate model paths or connector names
    pub fn build(self) -> Result<Arc<ScriptEngine>> {
        let resolver = EntityResolver::build(&self.model)?;

        let store: Arc<dyn ParameterStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryParameterStore::seeded(&self.model, &resolver)),
        };
        let executor: Arc<dyn ActivityExecutor> = match self.executor {
            Some(executor) => executor,
            None => Arc::new(RecordingExecutor::new()),
        };
        let log: Arc<dyn OperationalLog> = match self.log {
            Some(log) => log,
            None => Arc::new(TracingLog),
        };

        let connectors = ConnectorRegistry::new();
        for pending in self.connectors {
            connectors.register(
                pending.name,
                pending.description,
                pending.defaults,
                pending.transport,
            )?;
        }

        info!(
            target: "scripting",
            "Script engine ready: {} entities, {} connectors, parameter wake {:?}",
            resolver.len(),
            connectors.names().len(),
            self.waits.parameter_wake
        );

        Ok(Arc::new(ScriptEngine {
            enablement: EnablementRegistry::new(&resolver),
            resolver,
            bus: EventBus::new(log.clone()),
            dispatcher: ActivityDispatcher::with_retention(executor, self.activities.retained),
            connectors,
            store,
            log,
            waits: self.waits,
        }))
    }
}

/// State shared by every script session of one monitored system
///
/// Scripts reach it through [`ScriptSession`]s; the monitoring pipeline and
/// the execution service feed it through the `publish_*` and `report_*`
/// methods. Engines are independent of each other.
pub struct ScriptEngine {
    pub(crate) resolver: EntityResolver,
    pub(crate) bus: EventBus,
    pub(crate) dispatcher: ActivityDispatcher,
    pub(crate) connectors: ConnectorRegistry,
    pub(crate) enablement: EnablementRegistry,
    pub(crate) store: Arc<dyn ParameterStore>,
    pub(crate) log: Arc<dyn OperationalLog>,
    pub(crate) waits: WaitConfig,
}

impl ScriptEngine {
    pub fn builder(model: SystemModel) -> EngineBuilder {
        EngineBuilder {
            model,
            store: None,
            executor: None,
            log: None,
            waits: WaitConfig::default(),
            activities: ActivityConfig::default(),
            connectors: Vec::new(),
        }
    }

    /// New session with its own abort signal
    pub fn session(self: &Arc<Self>, script: impl Into<String>) -> ScriptSession {
        ScriptSession::new(self.clone(), script.into(), Arc::new(AbortSignal::new()))
    }

    pub fn session_with_signal(
        self: &Arc<Self>,
        script: impl Into<String>,
        abort: Arc<AbortSignal>,
    ) -> ScriptSession {
        ScriptSession::new(self.clone(), script.into(), abort)
    }

    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    pub fn connectors(&self) -> &ConnectorRegistry {
        &self.connectors
    }

    /// Feed a sample acquired by the monitoring pipeline
    pub fn publish_sample(&self, sample: ParameterSample) {
        self.bus.publish_sample(sample);
    }

    /// Feed an occurrence detected by the monitoring pipeline
    pub fn publish_event(&self, occurrence: EventOccurrence) {
        self.bus.publish_event(occurrence);
    }

    /// Progress reported by the activity execution service
    pub fn report_activity(
        &self,
        invocation: ActivityInvocationId,
        state: ActivityState,
    ) -> Result<()> {
        self.dispatcher.report(invocation, state)
    }

    /// `NotFound` once a finished instance has been evicted
    pub fn activity_state(&self, invocation: ActivityInvocationId) -> Result<ActivityState> {
        self.dispatcher.status(invocation)
    }

    /// Link failure reported by a connector transport
    pub fn report_connector_failure(&self, name: &str, reason: &str) -> Result<ConnectorState> {
        self.connectors.report_failure(name, reason)
    }

    /// Scripts currently blocked on an event
    pub fn event_waiters(&self, id: EntityId) -> usize {
        self.bus.event_waiters(id)
    }

    /// Scripts currently blocked on a parameter
    pub fn parameter_waiters(&self, id: EntityId) -> usize {
        self.bus.parameter_waiters(id)
    }

    /// Monitoring flags, as read by the processing pipeline
    pub fn enablement(&self, id: EntityId) -> Option<EnablementFlag> {
        self.enablement.flag(id)
    }
}
