use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{AbortSignal, ScriptEngine, ScriptManager};
use crate::activity::{
    ActivityHandle, ActivityInvocationId, ActivitySchedule, ActivityState, ScheduleTrigger,
};
use crate::connector::ConnectorState;
use crate::error::{BridgeError, Result};
use crate::events::{EventFilter, WaitOutcome};
use crate::model::{
    EntityId, EntityKind, EventOccurrence, ParameterSample, Severity, SystemEntity, Value,
};

/// One script's view of a [`ScriptEngine`]
pub struct ScriptSession {
    engine: Arc<ScriptEngine>,
    script: String,
    abort: Arc<AbortSignal>,
}

impl ScriptSession {
    pub(crate) fn new(engine: Arc<ScriptEngine>, script: String, abort: Arc<AbortSignal>) -> Self {
        Self {
            engine,
            script,
            abort,
        }
    }

    pub fn abort_signal(&self) -> &Arc<AbortSignal> {
        &self.abort
    }

    fn check(&self) -> Result<()> {
        if self.abort.is_aborted() {
            return Err(BridgeError::Aborted(self.script.clone()));
        }
        Ok(())
    }

    fn resolve(&self, path: &str, kind: EntityKind) -> Result<EntityId> {
        self.check()?;
        self.engine.resolver.resolve_kind(path, kind)
    }

    fn message(&self, text: &str, severity: Severity) -> Result<()> {
        self.check()?;
        self.engine.log.message(&self.script, text, severity);
        Ok(())
    }

    fn timeout(&self, timeout: Duration) -> Duration {
        self.engine.waits.clamp(timeout)
    }

    fn wait_event(
        &self,
        path: &str,
        qualifier: Option<&str>,
        timeout: Duration,
    ) -> Result<WaitOutcome<EventOccurrence>> {
        let id = self.resolve(path, EntityKind::Event)?;
        let mut filter = EventFilter::new(id);
        if let Some(qualifier) = qualifier {
            filter = filter.with_qualifier(qualifier);
        }
        debug!(target: "scripting", "{} waiting for {} ({:?})", self.script, path, qualifier);
        Ok(self
            .engine
            .bus
            .wait_for_event(filter, self.timeout(timeout), Some(&self.abort)))
    }
}

impl ScriptManager for ScriptSession {
    fn script_name(&self) -> &str {
        &self.script
    }

    fn info(&self, message: &str) -> Result<()> {
        self.message(message, Severity::Info)
    }

    fn warning(&self, message: &str) -> Result<()> {
        self.message(message, Severity::Warning)
    }

    fn alarm(&self, message: &str) -> Result<()> {
        self.message(message, Severity::Alarm)
    }

    fn parameter(&self, path: &str) -> Result<Option<ParameterSample>> {
        let id = self.resolve(path, EntityKind::Parameter)?;
        Ok(self.engine.store.current(id))
    }

    fn event(&self, path: &str) -> Result<Option<EventOccurrence>> {
        let id = self.resolve(path, EntityKind::Event)?;
        Ok(self.engine.bus.last_occurrence(id))
    }

    fn set(&self, path: &str, value: Value) -> Result<()> {
        let id = self.resolve(path, EntityKind::Parameter)?;
        debug!(target: "scripting", "{} sets {} to {}", self.script, path, value);
        self.engine
            .store
            .set(id, &value)
            .map_err(|e| BridgeError::collaborator("parameter store", e))
    }

    fn inject_parameter(&self, path: &str, value: Value) -> Result<()> {
        let id = self.resolve(path, EntityKind::Parameter)?;
        let sample = ParameterSample::new(id, value);
        self.engine
            .store
            .inject(&sample)
            .map_err(|e| BridgeError::collaborator("parameter store", e))?;
        self.engine.bus.publish_sample(sample);
        Ok(())
    }

    fn raise_event(
        &self,
        path: &str,
        qualifier: Option<String>,
        report: Option<String>,
    ) -> Result<()> {
        let id = self.resolve(path, EntityKind::Event)?;
        self.engine
            .bus
            .raise(id, path, qualifier, report, Some(self.script.clone()));
        Ok(())
    }

    fn wait_for_event(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome<EventOccurrence>> {
        self.wait_event(path, None, timeout)
    }

    fn wait_for_qualified_event(
        &self,
        path: &str,
        qualifier: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome<EventOccurrence>> {
        self.wait_event(path, Some(qualifier), timeout)
    }

    fn wait_for_parameter(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome<ParameterSample>> {
        let id = self.resolve(path, EntityKind::Parameter)?;
        Ok(self.engine.bus.wait_for_parameter(
            id,
            self.engine.waits.parameter_wake,
            || self.engine.store.current(id),
            self.timeout(timeout),
            Some(&self.abort),
        ))
    }

    fn prepare_activity(&self, path: &str) -> Result<ActivityHandle> {
        let id = self.resolve(path, EntityKind::Activity)?;
        let entity = self
            .engine
            .resolver
            .entity_by_id(id)
            .ok_or_else(|| BridgeError::not_found(path))?;
        Ok(ActivityHandle::new(id, entity.path.clone()))
    }

    fn execute_activity(&self, handle: ActivityHandle) -> Result<ActivityInvocationId> {
        self.check()?;
        self.engine.dispatcher.execute(handle)
    }

    fn schedule_activity(
        &self,
        handle: ActivityHandle,
        external_id: &str,
        trigger: ScheduleTrigger,
    ) -> Result<ActivityInvocationId> {
        let schedule = handle.prepare_schedule(self.script.as_str(), external_id, None);
        self.schedule_prepared_activity(schedule, trigger)
    }

    fn schedule_prepared_activity(
        &self,
        schedule: ActivitySchedule,
        trigger: ScheduleTrigger,
    ) -> Result<ActivityInvocationId> {
        self.check()?;
        self.engine.dispatcher.schedule(schedule, trigger)
    }

    fn wait_for_activity(
        &self,
        invocation: ActivityInvocationId,
        timeout: Duration,
    ) -> Result<WaitOutcome<ActivityState>> {
        self.check()?;
        self.engine.dispatcher.wait_for_completion(
            invocation,
            self.timeout(timeout),
            Some(&self.abort),
        )
    }

    fn delete_scheduled_activity(&self, external_id: &str) -> Result<()> {
        self.check()?;
        self.engine.dispatcher.delete_scheduled_activity(external_id)
    }

    fn connector_status(&self, name: &str) -> Result<ConnectorState> {
        self.check()?;
        self.engine.connectors.status(name)
    }

    fn start_connector(&self, name: &str) -> Result<()> {
        self.check()?;
        self.engine.connectors.start(name)
    }

    fn stop_connector(&self, name: &str) -> Result<()> {
        self.check()?;
        self.engine.connectors.stop(name)
    }

    fn abort_connector(&self, name: &str) -> Result<()> {
        self.check()?;
        self.engine.connectors.abort(name)
    }

    fn init_connector(&self, name: &str, keys: &[String], values: &[Value]) -> Result<()> {
        self.check()?;
        self.engine.connectors.init(name, keys, values)
    }

    fn system_entity(&self, path: &str) -> Result<SystemEntity> {
        self.check()?;
        self.engine.resolver.entity(path).cloned()
    }

    fn enable(&self, path: &str) -> Result<()> {
        self.check()?;
        let id = self.engine.resolver.resolve(path)?;
        self.engine.enablement.enable(id).map(|_| ())
    }

    fn disable(&self, path: &str) -> Result<()> {
        self.check()?;
        let id = self.engine.resolver.resolve(path)?;
        self.engine.enablement.disable(id).map(|_| ())
    }

    fn ignore(&self, path: &str) -> Result<()> {
        self.check()?;
        let id = self.engine.resolver.resolve(path)?;
        self.engine.enablement.ignore(id).map(|_| ())
    }
}
