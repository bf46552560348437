// Event bus shared by every script session of one engine.
// Scripts raise and wait; the monitoring pipeline feeds samples and occurrences.

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::waiter::{WaitOutcome, WaitTable};
use crate::collaborators::OperationalLog;
use crate::model::{EntityId, EventOccurrence, ParameterSample, Value};
use crate::scripting::AbortSignal;

/// What an event waiter is interested in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub id: EntityId,
    /// When set, only occurrences with this exact qualifier match
    pub qualifier: Option<String>,
}

impl EventFilter {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            qualifier: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn matches(&self, occurrence: &EventOccurrence) -> bool {
        occurrence.id == self.id
            && match &self.qualifier {
                Some(q) => occurrence.qualifier.as_deref() == Some(q.as_str()),
                None => true,
            }
    }
}

/// When a parameter waiter is woken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterWakePolicy {
    /// Any new sample wakes the waiter
    #[default]
    EverySample,
    /// Only a sample whose value differs from the one current at registration
    ValueChange,
}

/// Publishes occurrences and samples to blocked script waiters
pub struct EventBus {
    events: WaitTable<EntityId, EventOccurrence>,
    samples: WaitTable<EntityId, ParameterSample>,
    /// Most recent occurrence per event, for `event(path)` queries
    last_events: Mutex<HashMap<EntityId, EventOccurrence>>,
    log: Arc<dyn OperationalLog>,
}

impl EventBus {
    pub fn new(log: Arc<dyn OperationalLog>) -> Self {
        Self {
            events: WaitTable::new(),
            samples: WaitTable::new(),
            last_events: Mutex::new(HashMap::new()),
            log,
        }
    }

    /// Stamp and publish a new occurrence
    ///
    /// `path` is only used for the audit record.
    pub fn raise(
        &self,
        id: EntityId,
        path: &str,
        qualifier: Option<String>,
        report: Option<String>,
        source: Option<String>,
    ) -> EventOccurrence {
        let (occurrence, woken) = self.events.publish_with(id, || {
            let mut last = self.last_events.lock();
            let mut occurrence_time = Utc::now();
            // Keep per-entity order even if the wall clock steps back
            if let Some(previous) = last.get(&id) {
                occurrence_time = occurrence_time.max(previous.occurrence_time);
            }
            let occurrence = EventOccurrence {
                id,
                qualifier,
                report,
                source,
                occurrence_time,
            };
            last.insert(id, occurrence.clone());
            occurrence
        });

        debug!(target: "events", "Raised {} ({}), woke {} waiter(s)", path, id, woken);
        self.log.event_raised(&occurrence, path);
        occurrence
    }

    /// Publish an occurrence produced outside the script engine
    pub fn publish_event(&self, occurrence: EventOccurrence) {
        let id = occurrence.id;
        let (_, woken) = self.events.publish_with(id, || {
            let mut last = self.last_events.lock();
            // Late deliveries wake waiters but never replace a newer occurrence
            let newer = last
                .get(&id)
                .map_or(true, |previous| occurrence.occurrence_time >= previous.occurrence_time);
            if newer {
                last.insert(id, occurrence.clone());
            }
            occurrence
        });
        debug!(target: "events", "Fed event {}, woke {} waiter(s)", id, woken);
    }

    /// Publish a new parameter sample
    pub fn publish_sample(&self, sample: ParameterSample) {
        let id = sample.id;
        let woken = self.samples.publish(id, sample);
        debug!(target: "events", "Fed sample for {}, woke {} waiter(s)", id, woken);
    }

    pub fn last_occurrence(&self, id: EntityId) -> Option<EventOccurrence> {
        self.last_events.lock().get(&id).cloned()
    }

    /// Block until an occurrence matching `filter` is published after this call
    pub fn wait_for_event(
        &self,
        filter: EventFilter,
        timeout: Duration,
        abort: Option<&AbortSignal>,
    ) -> WaitOutcome<EventOccurrence> {
        let id = filter.id;
        let registration = self
            .events
            .register(id, move |occurrence| filter.matches(occurrence));
        registration.wait(timeout, abort)
    }

    /// Block until a sample for `id` arrives that satisfies `policy`
    ///
    /// `current` reads the stored value. Under
    /// [`ParameterWakePolicy::ValueChange`] the value it returns at the start of
    /// the call is the baseline, and it is read again once the waiter is
    /// registered so a change stored in between is not lost.
    pub fn wait_for_parameter(
        &self,
        id: EntityId,
        policy: ParameterWakePolicy,
        current: impl Fn() -> Option<ParameterSample>,
        timeout: Duration,
        abort: Option<&AbortSignal>,
    ) -> WaitOutcome<ParameterSample> {
        let baseline: Option<Value> = match policy {
            ParameterWakePolicy::EverySample => None,
            ParameterWakePolicy::ValueChange => current().map(|sample| sample.value),
        };
        let registered_baseline = baseline.clone();
        let registration = self.samples.register(id, move |sample| match policy {
            ParameterWakePolicy::EverySample => true,
            ParameterWakePolicy::ValueChange => {
                registered_baseline.as_ref() != Some(&sample.value)
            }
        });

        if policy == ParameterWakePolicy::ValueChange {
            if let Some(sample) = current() {
                if baseline.as_ref() != Some(&sample.value) {
                    debug!(target: "events", "{} changed before the waiter registered", id);
                    return WaitOutcome::Received(sample);
                }
            }
        }

        registration.wait(timeout, abort)
    }

    pub fn event_waiters(&self, id: EntityId) -> usize {
        self.events.waiter_count(id)
    }

    pub fn parameter_waiters(&self, id: EntityId) -> usize {
        self.samples.waiter_count(id)
    }
}
