use crate::activity::ActivityState;
use crate::connector::ConnectorState;

/// Errors surfaced to a calling script.
///
/// Bounded waits never produce an error on timeout or cancellation, see
/// [`crate::events::WaitOutcome`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    /// A path, connector name, or scheduled activity id did not resolve
    #[error("not found: {0}")]
    NotFound(String),

    /// The system model contains the same path twice
    #[error("ambiguous path: {0}")]
    AmbiguousPath(String),

    /// Connector transition not allowed from the current state
    #[error("connector {name} cannot {operation} while {state}")]
    ConnectorState {
        name: String,
        operation: &'static str,
        state: ConnectorState,
    },

    /// Activity transition not allowed from the current state
    #[error("activity {invocation} cannot move from {from} to {to}")]
    ActivityState {
        invocation: String,
        from: ActivityState,
        to: ActivityState,
    },

    /// Any other illegal state transition
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The calling script has been aborted
    #[error("script {0} aborted")]
    Aborted(String),

    /// A collaborator (store, executor, transport) rejected the call
    #[error("{collaborator} failed: {message}")]
    Collaborator {
        collaborator: &'static str,
        message: String,
    },
}

impl BridgeError {
    pub fn not_found(what: impl Into<String>) -> Self {
        BridgeError::NotFound(what.into())
    }

    pub fn collaborator(collaborator: &'static str, message: impl std::fmt::Display) -> Self {
        BridgeError::Collaborator {
            collaborator,
            message: message.to_string(),
        }
    }

    /// True for every illegal-transition variant
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            BridgeError::ConnectorState { .. }
                | BridgeError::ActivityState { .. }
                | BridgeError::InvalidState(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BridgeError::NotFound(_))
    }
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
