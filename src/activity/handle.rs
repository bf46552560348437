use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use strum_macros::Display;

use super::ActivityInvocationId;
use crate::model::{EntityId, EntityPath, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityArgument {
    pub name: String,
    pub value: Value,
    /// Engineering value (true) or raw value (false)
    pub engineering: bool,
}

/// A prepared activity, not yet dispatched
///
/// Building a handle has no effect on the monitored system; scripts adjust
/// route, properties and arguments and then execute or schedule it.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityHandle {
    activity: EntityId,
    path: EntityPath,
    route: Option<String>,
    properties: BTreeMap<String, String>,
    arguments: Vec<ActivityArgument>,
}

impl ActivityHandle {
    pub(crate) fn new(activity: EntityId, path: EntityPath) -> Self {
        Self {
            activity,
            path,
            route: None,
            properties: BTreeMap::new(),
            arguments: Vec::new(),
        }
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Add an argument; a second argument with the same name replaces the first
    pub fn with_argument(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        engineering: bool,
    ) -> Self {
        let argument = ActivityArgument {
            name: name.into(),
            value: value.into(),
            engineering,
        };
        match self.arguments.iter_mut().find(|a| a.name == argument.name) {
            Some(existing) => *existing = argument,
            None => self.arguments.push(argument),
        }
        self
    }

    pub fn activity(&self) -> EntityId {
        self.activity
    }

    pub fn path(&self) -> &EntityPath {
        &self.path
    }

    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn arguments(&self) -> &[ActivityArgument] {
        &self.arguments
    }

    /// Turn the handle into a scheduling request
    ///
    /// `source` names who asked for it; `expected_duration` is left to the
    /// scheduler when `None`.
    pub fn prepare_schedule(
        self,
        source: impl Into<String>,
        external_id: impl Into<String>,
        expected_duration: Option<Duration>,
    ) -> ActivitySchedule {
        ActivitySchedule {
            handle: self,
            source: source.into(),
            external_id: external_id.into(),
            expected_duration,
            resources: BTreeSet::new(),
            latest_invocation_time: None,
            conflict_strategy: ConflictStrategy::default(),
            creation_conflict_strategy: CreationConflictStrategy::default(),
        }
    }

    pub(crate) fn into_request(self, invocation: ActivityInvocationId) -> ActivityRequest {
        ActivityRequest {
            invocation,
            activity: self.activity,
            path: self.path,
            route: self.route,
            properties: self.properties,
            arguments: self.arguments,
        }
    }
}

/// What the execution collaborator receives
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRequest {
    pub invocation: ActivityInvocationId,
    pub activity: EntityId,
    pub path: EntityPath,
    pub route: Option<String>,
    pub properties: BTreeMap<String, String>,
    pub arguments: Vec<ActivityArgument>,
}

/// What the scheduler does when the resources of a due activity are taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum ConflictStrategy {
    /// Wait for the resources, up to the latest invocation time
    #[default]
    Wait,
    DoNotStartAndForget,
    StartAnyway,
    AbortOtherAndStart,
}

/// What the scheduler does when the new item overlaps already scheduled ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum CreationConflictStrategy {
    /// Reject the new item
    Abort,
    SkipNew,
    RemovePrevious,
    #[default]
    AddAnyway,
}

/// A prepared activity plus its scheduling options
///
/// Built with [`ActivityHandle::prepare_schedule`]; the trigger is supplied
/// when it is handed to the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySchedule {
    handle: ActivityHandle,
    source: String,
    external_id: String,
    expected_duration: Option<Duration>,
    resources: BTreeSet<String>,
    latest_invocation_time: Option<DateTime<Utc>>,
    conflict_strategy: ConflictStrategy,
    creation_conflict_strategy: CreationConflictStrategy,
}

impl ActivitySchedule {
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resources.insert(resource.into());
        self
    }

    pub fn with_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resources.extend(resources.into_iter().map(Into::into));
        self
    }

    /// Give up if the activity cannot start by `time`
    pub fn with_latest_invocation_time(mut self, time: DateTime<Utc>) -> Self {
        self.latest_invocation_time = Some(time);
        self
    }

    pub fn with_conflict_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_strategy = strategy;
        self
    }

    pub fn with_creation_conflict_strategy(mut self, strategy: CreationConflictStrategy) -> Self {
        self.creation_conflict_strategy = strategy;
        self
    }

    pub(crate) fn into_request(
        self,
        invocation: ActivityInvocationId,
        trigger: ScheduleTrigger,
    ) -> SchedulingRequest {
        SchedulingRequest {
            activity: self.handle.into_request(invocation),
            source: self.source,
            external_id: self.external_id,
            expected_duration: self.expected_duration,
            resources: self.resources,
            latest_invocation_time: self.latest_invocation_time,
            conflict_strategy: self.conflict_strategy,
            creation_conflict_strategy: self.creation_conflict_strategy,
            trigger,
        }
    }
}

/// What the scheduler receives
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingRequest {
    pub activity: ActivityRequest,
    pub source: String,
    pub external_id: String,
    pub expected_duration: Option<Duration>,
    pub resources: BTreeSet<String>,
    pub latest_invocation_time: Option<DateTime<Utc>>,
    pub conflict_strategy: ConflictStrategy,
    pub creation_conflict_strategy: CreationConflictStrategy,
    pub trigger: ScheduleTrigger,
}

/// When a scheduled activity should run
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleTrigger {
    /// At a fixed time
    Absolute(DateTime<Utc>),
    /// After a delay, counted from the completion of the named predecessors
    Relative {
        delay: Duration,
        predecessors: Vec<String>,
    },
    /// When an event occurs, ignoring repeats within the protection time
    Event {
        event: EntityId,
        protection: Duration,
    },
}
