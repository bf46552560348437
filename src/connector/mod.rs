/// Connector lifecycle management
pub mod registry;

use serde::Serialize;
use strum_macros::Display;

pub use registry::{ConnectorInfo, ConnectorRegistry};

/// Lifecycle state of a connector
///
/// `Uninitialized -> Initialized -> Running -> Stopped -> Initialized`, with
/// `Aborted` reachable from `Running` or `Initialized`. Only `init` leaves
/// `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
pub enum ConnectorState {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
    Aborted,
}

impl ConnectorState {
    pub fn can_init(&self) -> bool {
        matches!(
            self,
            ConnectorState::Uninitialized | ConnectorState::Stopped | ConnectorState::Aborted
        )
    }

    pub fn can_start(&self) -> bool {
        *self == ConnectorState::Initialized
    }

    pub fn can_stop(&self) -> bool {
        *self == ConnectorState::Running
    }

    pub fn can_abort(&self) -> bool {
        matches!(self, ConnectorState::Running | ConnectorState::Initialized)
    }
}
