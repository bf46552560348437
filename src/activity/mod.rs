/// Activity preparation, dispatch and scheduled-instance cancellation
pub mod dispatcher;
pub mod handle;

use strum_macros::Display;

pub use dispatcher::ActivityDispatcher;
pub use handle::{
    ActivityArgument, ActivityHandle, ActivityRequest, ActivitySchedule, ConflictStrategy,
    CreationConflictStrategy, ScheduleTrigger, SchedulingRequest,
};

/// Identifier of one dispatched (executed or scheduled) activity instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActivityInvocationId(u64);

impl ActivityInvocationId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ActivityInvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "act-{}", self.0)
    }
}

/// Execution state of an activity instance
///
/// `Prepared -> Scheduled -> {Running -> Completed | Failed} | Aborted`, with
/// direct execution going `Prepared -> Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ActivityState {
    Prepared,
    Scheduled,
    Running,
    Completed,
    Failed,
    Aborted,
}

impl ActivityState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActivityState::Completed | ActivityState::Failed | ActivityState::Aborted
        )
    }

    /// Transitions the execution collaborator may report
    pub fn can_transition_to(&self, next: ActivityState) -> bool {
        use ActivityState::*;
        matches!(
            (self, next),
            (Prepared, Scheduled)
                | (Prepared, Running)
                | (Scheduled, Running)
                | (Scheduled, Aborted)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Aborted)
        )
    }
}
