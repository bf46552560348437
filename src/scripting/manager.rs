use std::time::Duration;

use crate::activity::{
    ActivityHandle, ActivityInvocationId, ActivitySchedule, ActivityState, ScheduleTrigger,
};
use crate::connector::ConnectorState;
use crate::error::Result;
use crate::events::WaitOutcome;
use crate::model::{EventOccurrence, ParameterSample, SystemEntity, Value};

/// Everything a running script may do to the monitored system
///
/// Each script receives its own implementation (a
/// [`ScriptSession`](super::ScriptSession)); once that script is aborted,
/// every call fails with [`BridgeError::Aborted`](crate::BridgeError::Aborted)
/// and an outstanding wait returns [`WaitOutcome::Cancelled`].
///
/// Paths are slash-delimited (`/sys/power/voltage`); a path that does not
/// resolve to an entity of the expected kind fails with `NotFound`.
#[cfg_attr(test, mockall::automock)]
pub trait ScriptManager: Send + Sync {
    /// Script name used as the source of messages and raised events
    fn script_name(&self) -> &str;

    fn info(&self, message: &str) -> Result<()>;

    fn warning(&self, message: &str) -> Result<()>;

    fn alarm(&self, message: &str) -> Result<()>;

    /// Current sample of a parameter, `None` if it never had one
    fn parameter(&self, path: &str) -> Result<Option<ParameterSample>>;

    /// Most recent occurrence of an event, `None` if never raised
    fn event(&self, path: &str) -> Result<Option<EventOccurrence>>;

    /// Ask the monitored system to change a parameter
    fn set(&self, path: &str, value: Value) -> Result<()>;

    /// Inject a sample as if it had been acquired; wakes parameter waiters
    fn inject_parameter(&self, path: &str, value: Value) -> Result<()>;

    fn raise_event(
        &self,
        path: &str,
        qualifier: Option<String>,
        report: Option<String>,
    ) -> Result<()>;

    /// Block until the event is raised after this call
    fn wait_for_event(&self, path: &str, timeout: Duration)
        -> Result<WaitOutcome<EventOccurrence>>;

    /// Like [`wait_for_event`](Self::wait_for_event), matching only `qualifier`
    fn wait_for_qualified_event(
        &self,
        path: &str,
        qualifier: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome<EventOccurrence>>;

    /// Block until a new sample for the parameter arrives
    fn wait_for_parameter(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome<ParameterSample>>;

    fn prepare_activity(&self, path: &str) -> Result<ActivityHandle>;

    fn execute_activity(&self, handle: ActivityHandle) -> Result<ActivityInvocationId>;

    /// Schedule with default options, the script's name as source
    fn schedule_activity(
        &self,
        handle: ActivityHandle,
        external_id: &str,
        trigger: ScheduleTrigger,
    ) -> Result<ActivityInvocationId>;

    /// Schedule with resources, deadline and conflict strategies
    fn schedule_prepared_activity(
        &self,
        schedule: ActivitySchedule,
        trigger: ScheduleTrigger,
    ) -> Result<ActivityInvocationId>;

    /// Block until the invocation reaches a terminal state
    fn wait_for_activity(
        &self,
        invocation: ActivityInvocationId,
        timeout: Duration,
    ) -> Result<WaitOutcome<ActivityState>>;

    fn delete_scheduled_activity(&self, external_id: &str) -> Result<()>;

    fn connector_status(&self, name: &str) -> Result<ConnectorState>;

    fn start_connector(&self, name: &str) -> Result<()>;

    /// Blocks while the connector drains
    fn stop_connector(&self, name: &str) -> Result<()>;

    fn abort_connector(&self, name: &str) -> Result<()>;

    fn init_connector(&self, name: &str, keys: &[String], values: &[Value]) -> Result<()>;

    /// Any entity, of any kind
    fn system_entity(&self, path: &str) -> Result<SystemEntity>;

    fn enable(&self, path: &str) -> Result<()>;

    fn disable(&self, path: &str) -> Result<()>;

    fn ignore(&self, path: &str) -> Result<()>;
}
