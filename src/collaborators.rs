/// Interfaces to the systems the script engine drives but does not own
///
/// The processing pipeline, the activity execution service and connector
/// transports each implement one of these traits. In-memory versions live in
/// [`crate::loopback`].
use std::collections::BTreeMap;
use tracing::{error, info, warn};

use crate::activity::{ActivityRequest, SchedulingRequest};
use crate::model::{EntityId, EventOccurrence, ParameterSample, Severity, Value};

/// Current parameter values plus the two write paths scripts have
pub trait ParameterStore: Send + Sync {
    /// Latest sample for a parameter, if one was ever produced
    fn current(&self, id: EntityId) -> Option<ParameterSample>;

    /// Inject a sample as if it had been acquired
    fn inject(&self, sample: &ParameterSample) -> anyhow::Result<()>;

    /// Request a value change on the monitored system
    fn set(&self, id: EntityId, value: &Value) -> anyhow::Result<()>;
}

/// Runs activities on the monitored system
///
/// Progress flows back through [`crate::activity::ActivityDispatcher::report`].
pub trait ActivityExecutor: Send + Sync {
    fn start(&self, request: &ActivityRequest) -> anyhow::Result<()>;

    /// Register a scheduled instance under `request.external_id`
    fn schedule(&self, request: &SchedulingRequest) -> anyhow::Result<()>;

    /// Remove a scheduled instance; an error means the scheduler still holds it
    fn cancel_scheduled(&self, external_id: &str) -> anyhow::Result<()>;
}

/// Wire-level side of a connector
pub trait ConnectorTransport: Send + Sync {
    fn initialise(&self, properties: &BTreeMap<String, Value>) -> anyhow::Result<()>;

    fn connect(&self) -> anyhow::Result<()>;

    /// Graceful disconnect; returns once in-flight work has drained
    fn disconnect(&self) -> anyhow::Result<()>;

    /// Drop in-flight work and disconnect immediately
    fn abort(&self);
}

/// Operator message distribution and event audit trail
pub trait OperationalLog: Send + Sync {
    fn message(&self, source: &str, text: &str, severity: Severity);

    fn event_raised(&self, occurrence: &EventOccurrence, path: &str);
}

/// [`OperationalLog`] that writes to tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl OperationalLog for TracingLog {
    fn message(&self, source: &str, text: &str, severity: Severity) {
        match severity {
            Severity::Info => info!(target: "scripting", source, "{}", text),
            Severity::Warning => warn!(target: "scripting", source, "{}", text),
            Severity::Alarm => error!(target: "scripting", source, "ALARM: {}", text),
        }
    }

    fn event_raised(&self, occurrence: &EventOccurrence, path: &str) {
        info!(
            target: "audit",
            path,
            qualifier = occurrence.qualifier.as_deref().unwrap_or(""),
            source = occurrence.source.as_deref().unwrap_or(""),
            "Event raised at {}",
            occurrence.occurrence_time
        );
    }
}
