use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{ActivityHandle, ActivityInvocationId, ActivitySchedule, ActivityState, ScheduleTrigger};
use crate::collaborators::ActivityExecutor;
use crate::error::{BridgeError, Result};
use crate::events::{WaitOutcome, WaitTable};
use crate::model::EntityPath;
use crate::scripting::AbortSignal;

/// Terminal instances kept for `status` queries when nothing else is configured
pub const DEFAULT_RETAINED_ACTIVITIES: usize = 256;

/// One dispatched activity instance
struct ActivityRecord {
    path: EntityPath,
    external_id: Option<String>,
    state: Mutex<ActivityState>,
}

/// Dispatches activities to the execution collaborator and tracks their state
///
/// Each instance has its own state lock; the record map lock is only held for
/// insertions, lookups and evictions. Only the most recent `retained`
/// terminal instances are remembered; older ones are evicted and answer
/// `NotFound` from [`status`](Self::status) and
/// [`wait_for_completion`](Self::wait_for_completion).
pub struct ActivityDispatcher {
    executor: Arc<dyn ActivityExecutor>,
    next_invocation: AtomicU64,
    records: RwLock<HashMap<ActivityInvocationId, Arc<ActivityRecord>>>,
    /// External id -> instance, for instances still in `Scheduled`
    scheduled: Mutex<HashMap<String, ActivityInvocationId>>,
    /// Serializes deletes across the scheduler round trip
    deleting: Mutex<()>,
    /// Terminal instances, oldest first
    finished: Mutex<VecDeque<ActivityInvocationId>>,
    retained: usize,
    completions: WaitTable<ActivityInvocationId, ActivityState>,
}

impl ActivityDispatcher {
    pub fn new(executor: Arc<dyn ActivityExecutor>) -> Self {
        Self::with_retention(executor, DEFAULT_RETAINED_ACTIVITIES)
    }

    pub fn with_retention(executor: Arc<dyn ActivityExecutor>, retained: usize) -> Self {
        Self {
            executor,
            next_invocation: AtomicU64::new(1),
            records: RwLock::new(HashMap::new()),
            scheduled: Mutex::new(HashMap::new()),
            deleting: Mutex::new(()),
            finished: Mutex::new(VecDeque::new()),
            retained,
            completions: WaitTable::new(),
        }
    }

    fn next_invocation(&self) -> ActivityInvocationId {
        ActivityInvocationId::new(self.next_invocation.fetch_add(1, Ordering::Relaxed))
    }

    fn insert(
        &self,
        invocation: ActivityInvocationId,
        path: EntityPath,
        external_id: Option<String>,
        state: ActivityState,
    ) {
        let record = Arc::new(ActivityRecord {
            path,
            external_id,
            state: Mutex::new(state),
        });
        self.records.write().insert(invocation, record);
    }

    fn record(&self, invocation: ActivityInvocationId) -> Result<Arc<ActivityRecord>> {
        self.records
            .read()
            .get(&invocation)
            .cloned()
            .ok_or_else(|| BridgeError::not_found(invocation.to_string()))
    }

    /// Dispatch a prepared activity for immediate execution
    pub fn execute(&self, handle: ActivityHandle) -> Result<ActivityInvocationId> {
        let request = handle.into_request(self.next_invocation());
        let invocation = request.invocation;
        info!(target: "activity", "Executing {} as {}", request.path, invocation);

        // Registered before start() so a synchronous report finds the record
        self.insert(invocation, request.path.clone(), None, ActivityState::Running);

        if let Err(e) = self.executor.start(&request) {
            error!(target: "activity", "Execution of {} failed to start: {:#}", invocation, e);
            self.fail(invocation);
            return Err(BridgeError::collaborator("activity executor", e));
        }

        Ok(invocation)
    }

    /// Hand a prepared schedule to the scheduler
    ///
    /// A second live instance under the same external id fails with
    /// `InvalidState`; the creation conflict strategy only governs overlaps
    /// the scheduler itself detects.
    pub fn schedule(
        &self,
        schedule: ActivitySchedule,
        trigger: ScheduleTrigger,
    ) -> Result<ActivityInvocationId> {
        let invocation = self.next_invocation();
        let request = schedule.into_request(invocation, trigger);
        let external_id = request.external_id.clone();

        {
            let mut scheduled = self.scheduled.lock();
            if scheduled.contains_key(&external_id) {
                return Err(BridgeError::InvalidState(format!(
                    "scheduled activity {} already exists",
                    external_id
                )));
            }
            scheduled.insert(external_id.clone(), invocation);
            self.insert(
                invocation,
                request.activity.path.clone(),
                Some(external_id.clone()),
                ActivityState::Scheduled,
            );
        }

        info!(
            target: "activity",
            "Scheduling {} as {} ({}) for {} with {:?}",
            request.activity.path, invocation, external_id, request.source, request.trigger
        );

        if let Err(e) = self.executor.schedule(&request) {
            error!(target: "activity", "Scheduling of {} rejected: {:#}", external_id, e);
            self.release_external_id(&external_id, invocation);
            self.fail(invocation);
            return Err(BridgeError::collaborator("activity scheduler", e));
        }

        Ok(invocation)
    }

    /// Cancel a scheduled instance that has not started yet
    ///
    /// Only `Scheduled` instances qualify; unknown, started, finished or
    /// already deleted ids all fail with `NotFound`. Nothing changes locally
    /// unless the scheduler confirms the removal.
    pub fn delete_scheduled_activity(&self, external_id: &str) -> Result<()> {
        let not_found = || BridgeError::not_found(format!("scheduled activity {}", external_id));
        let _deleting = self.deleting.lock();

        let invocation = self
            .scheduled
            .lock()
            .get(external_id)
            .copied()
            .ok_or_else(not_found)?;
        let record = self.record(invocation)?;
        if *record.state.lock() != ActivityState::Scheduled {
            return Err(not_found());
        }

        self.executor.cancel_scheduled(external_id).map_err(|e| {
            warn!(target: "activity", "Scheduler kept {}: {:#}", external_id, e);
            BridgeError::collaborator("activity scheduler", e)
        })?;

        {
            let mut state = record.state.lock();
            // Started while the scheduler was being asked
            if *state != ActivityState::Scheduled {
                return Err(not_found());
            }
            *state = ActivityState::Aborted;
        }
        self.release_external_id(external_id, invocation);
        self.finish(invocation, ActivityState::Aborted);

        info!(
            target: "activity",
            "Deleted scheduled activity {} ({}, {})",
            external_id, record.path, invocation
        );
        Ok(())
    }

    /// Apply a state change reported by the execution collaborator
    pub fn report(&self, invocation: ActivityInvocationId, next: ActivityState) -> Result<()> {
        let record = self.record(invocation)?;

        let previous = {
            let mut state = record.state.lock();
            if !state.can_transition_to(next) {
                return Err(BridgeError::ActivityState {
                    invocation: invocation.to_string(),
                    from: *state,
                    to: next,
                });
            }
            std::mem::replace(&mut *state, next)
        };

        debug!(target: "activity", "{} ({}) {} -> {}", invocation, record.path, previous, next);

        if previous == ActivityState::Scheduled {
            if let Some(external_id) = &record.external_id {
                self.release_external_id(external_id, invocation);
            }
        }
        if next.is_terminal() {
            self.finish(invocation, next);
        }
        Ok(())
    }

    pub fn status(&self, invocation: ActivityInvocationId) -> Result<ActivityState> {
        Ok(*self.record(invocation)?.state.lock())
    }

    /// Block until the instance reaches a terminal state
    pub fn wait_for_completion(
        &self,
        invocation: ActivityInvocationId,
        timeout: Duration,
        abort: Option<&AbortSignal>,
    ) -> Result<WaitOutcome<ActivityState>> {
        let record = self.record(invocation)?;
        let registration = self
            .completions
            .register(invocation, |state: &ActivityState| state.is_terminal());

        // Registered first, so a completion racing this check is not lost
        let current = *record.state.lock();
        if current.is_terminal() {
            return Ok(WaitOutcome::Received(current));
        }

        Ok(registration.wait(timeout, abort))
    }

    /// Collaborator refused the instance before it ever ran
    fn fail(&self, invocation: ActivityInvocationId) {
        let Ok(record) = self.record(invocation) else {
            return;
        };
        {
            let mut state = record.state.lock();
            if state.is_terminal() {
                return;
            }
            *state = ActivityState::Failed;
        }
        self.finish(invocation, ActivityState::Failed);
    }

    /// Wake waiters, then evict the oldest terminal instances past the limit
    fn finish(&self, invocation: ActivityInvocationId, state: ActivityState) {
        self.completions.publish(invocation, state);

        let evicted: Vec<ActivityInvocationId> = {
            let mut finished = self.finished.lock();
            finished.push_back(invocation);
            let excess = finished.len().saturating_sub(self.retained);
            finished.drain(..excess).collect()
        };
        if !evicted.is_empty() {
            let mut records = self.records.write();
            for id in &evicted {
                records.remove(id);
            }
            debug!(target: "activity", "Evicted {} finished activities", evicted.len());
        }
    }

    fn release_external_id(&self, external_id: &str, invocation: ActivityInvocationId) {
        let mut scheduled = self.scheduled.lock();
        if scheduled.get(external_id) == Some(&invocation) {
            scheduled.remove(external_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ConflictStrategy, CreationConflictStrategy};
    use crate::loopback::RecordingExecutor;
    use crate::model::{EntityId, EntityPath};
    use std::thread;

    fn handle() -> ActivityHandle {
        ActivityHandle::new(
            EntityId::new(2),
            EntityPath::parse("/sys/power/switch_on").unwrap(),
        )
    }

    fn plan(external_id: &str) -> ActivitySchedule {
        handle().prepare_schedule("test", external_id, None)
    }

    fn trigger() -> ScheduleTrigger {
        ScheduleTrigger::Relative {
            delay: Duration::from_secs(60),
            predecessors: Vec::new(),
        }
    }

    #[test]
    fn test_execute_reaches_executor() {
        let executor = Arc::new(RecordingExecutor::new());
        let dispatcher = ActivityDispatcher::new(executor.clone());

        let invocation = dispatcher.execute(handle().with_argument("on", true, true)).unwrap();
        assert_eq!(
            dispatcher.status(invocation).unwrap(),
            ActivityState::Running
        );

        let started = executor.started();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].invocation, invocation);
        assert_eq!(started[0].arguments.len(), 1);
    }

    #[test]
    fn test_executor_failure_marks_failed() {
        let executor = Arc::new(RecordingExecutor::new());
        executor.fail_next_start("uplink unavailable");
        let dispatcher = ActivityDispatcher::new(executor);

        let err = dispatcher.execute(handle()).unwrap_err();
        assert!(matches!(err, BridgeError::Collaborator { .. }));
    }

    #[test]
    fn test_delete_scheduled_once() {
        let executor = Arc::new(RecordingExecutor::new());
        let dispatcher = ActivityDispatcher::new(executor.clone());

        let invocation = dispatcher.schedule(plan("pass-42"), trigger()).unwrap();
        assert_eq!(
            dispatcher.status(invocation).unwrap(),
            ActivityState::Scheduled
        );

        dispatcher.delete_scheduled_activity("pass-42").unwrap();
        assert_eq!(
            dispatcher.status(invocation).unwrap(),
            ActivityState::Aborted
        );
        assert_eq!(executor.cancelled(), vec!["pass-42".to_string()]);

        // Second delete is not idempotent
        assert!(dispatcher
            .delete_scheduled_activity("pass-42")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_delete_unknown_or_started_not_found() {
        let executor = Arc::new(RecordingExecutor::new());
        let dispatcher = ActivityDispatcher::new(executor);

        assert!(dispatcher
            .delete_scheduled_activity("never-scheduled")
            .unwrap_err()
            .is_not_found());

        let invocation = dispatcher.schedule(plan("pass-7"), trigger()).unwrap();
        dispatcher.report(invocation, ActivityState::Running).unwrap();
        assert!(dispatcher
            .delete_scheduled_activity("pass-7")
            .unwrap_err()
            .is_not_found());

        dispatcher.report(invocation, ActivityState::Completed).unwrap();
        assert!(dispatcher
            .delete_scheduled_activity("pass-7")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_external_id_reusable_after_completion() {
        let executor = Arc::new(RecordingExecutor::new());
        let dispatcher = ActivityDispatcher::new(executor);

        let first = dispatcher.schedule(plan("daily"), trigger()).unwrap();
        assert!(dispatcher
            .schedule(plan("daily"), trigger())
            .unwrap_err()
            .is_invalid_state());

        dispatcher.report(first, ActivityState::Running).unwrap();
        dispatcher.report(first, ActivityState::Completed).unwrap();
        assert!(dispatcher.schedule(plan("daily"), trigger()).is_ok());
    }

    #[test]
    fn test_illegal_report_rejected() {
        let executor = Arc::new(RecordingExecutor::new());
        let dispatcher = ActivityDispatcher::new(executor);

        let invocation = dispatcher.schedule(plan("x"), trigger()).unwrap();
        let err = dispatcher
            .report(invocation, ActivityState::Completed)
            .unwrap_err();
        assert!(err.is_invalid_state());

        dispatcher.delete_scheduled_activity("x").unwrap();
        // The scheduler lost the race with the delete
        assert!(dispatcher
            .report(invocation, ActivityState::Running)
            .unwrap_err()
            .is_invalid_state());
    }

    #[test]
    fn test_failed_cancel_keeps_instance_scheduled() {
        let executor = Arc::new(RecordingExecutor::new());
        let dispatcher = ActivityDispatcher::new(executor.clone());
        let invocation = dispatcher.schedule(plan("pass-9"), trigger()).unwrap();

        executor.fail_next_cancel("scheduler unreachable");
        let err = dispatcher.delete_scheduled_activity("pass-9").unwrap_err();
        assert!(matches!(err, BridgeError::Collaborator { .. }));
        assert_eq!(
            dispatcher.status(invocation).unwrap(),
            ActivityState::Scheduled
        );

        // The job is still tracked when the scheduler starts it
        dispatcher.report(invocation, ActivityState::Running).unwrap();
        assert!(dispatcher
            .delete_scheduled_activity("pass-9")
            .unwrap_err()
            .is_not_found());
        assert!(executor.cancelled().is_empty());
    }

    #[test]
    fn test_delete_retried_after_failed_cancel() {
        let executor = Arc::new(RecordingExecutor::new());
        let dispatcher = ActivityDispatcher::new(executor.clone());
        let invocation = dispatcher.schedule(plan("pass-10"), trigger()).unwrap();

        executor.fail_next_cancel("scheduler unreachable");
        assert!(dispatcher.delete_scheduled_activity("pass-10").is_err());

        dispatcher.delete_scheduled_activity("pass-10").unwrap();
        assert_eq!(
            dispatcher.status(invocation).unwrap(),
            ActivityState::Aborted
        );
        assert_eq!(executor.cancelled(), vec!["pass-10".to_string()]);
    }

    #[test]
    fn test_finished_activities_are_evicted() {
        let executor = Arc::new(RecordingExecutor::new());
        let dispatcher = ActivityDispatcher::with_retention(executor, 8);

        let mut invocations = Vec::new();
        for _ in 0..100 {
            let invocation = dispatcher.execute(handle()).unwrap();
            dispatcher.report(invocation, ActivityState::Completed).unwrap();
            invocations.push(invocation);
        }
        let live = dispatcher.execute(handle()).unwrap();

        assert_eq!(dispatcher.records.read().len(), 9);
        assert!(dispatcher.status(invocations[0]).unwrap_err().is_not_found());
        assert!(dispatcher
            .wait_for_completion(invocations[0], Duration::ZERO, None)
            .unwrap_err()
            .is_not_found());
        assert_eq!(
            dispatcher.status(invocations[99]).unwrap(),
            ActivityState::Completed
        );
        assert_eq!(dispatcher.status(live).unwrap(), ActivityState::Running);
    }

    #[test]
    fn test_schedule_options_reach_scheduler() {
        let executor = Arc::new(RecordingExecutor::new());
        let dispatcher = ActivityDispatcher::new(executor.clone());

        let schedule = handle()
            .with_argument("on", true, true)
            .prepare_schedule("ops-console", "pass-11", Some(Duration::from_secs(120)))
            .with_resources(["antenna-1", "uplink"])
            .with_conflict_strategy(ConflictStrategy::DoNotStartAndForget)
            .with_creation_conflict_strategy(CreationConflictStrategy::RemovePrevious);
        let invocation = dispatcher.schedule(schedule, trigger()).unwrap();

        let scheduled = executor.scheduled();
        assert_eq!(scheduled.len(), 1);
        let request = &scheduled[0];
        assert_eq!(request.activity.invocation, invocation);
        assert_eq!(request.activity.arguments.len(), 1);
        assert_eq!(request.source, "ops-console");
        assert_eq!(request.external_id, "pass-11");
        assert_eq!(request.expected_duration, Some(Duration::from_secs(120)));
        assert!(request.resources.contains("antenna-1"));
        assert_eq!(
            request.conflict_strategy,
            ConflictStrategy::DoNotStartAndForget
        );
        assert_eq!(
            request.creation_conflict_strategy,
            CreationConflictStrategy::RemovePrevious
        );
        assert_eq!(request.trigger, trigger());
    }

    #[test]
    fn test_wait_for_completion() {
        let executor = Arc::new(RecordingExecutor::new());
        let dispatcher = Arc::new(ActivityDispatcher::new(executor));
        let invocation = dispatcher.execute(handle()).unwrap();

        let waiter = {
            let dispatcher = dispatcher.clone();
            thread::spawn(move || {
                dispatcher
                    .wait_for_completion(invocation, Duration::from_secs(5), None)
                    .unwrap()
            })
        };

        while dispatcher.completions.waiter_count(invocation) == 0 {
            thread::sleep(Duration::from_millis(2));
        }
        dispatcher.report(invocation, ActivityState::Completed).unwrap();

        assert_eq!(
            waiter.join().unwrap(),
            WaitOutcome::Received(ActivityState::Completed)
        );

        // Already terminal: returns immediately
        assert_eq!(
            dispatcher
                .wait_for_completion(invocation, Duration::ZERO, None)
                .unwrap(),
            WaitOutcome::Received(ActivityState::Completed)
        );
    }

    #[test]
    fn test_wait_for_completion_times_out() {
        let executor = Arc::new(RecordingExecutor::new());
        let dispatcher = ActivityDispatcher::new(executor);
        let invocation = dispatcher.execute(handle()).unwrap();

        let outcome = dispatcher
            .wait_for_completion(invocation, Duration::from_millis(20), None)
            .unwrap();
        assert!(outcome.is_timed_out());
    }
}
