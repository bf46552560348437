/// Event distribution and bounded waits for scripts
pub mod event_bus;
mod waiter;

pub use event_bus::{EventBus, EventFilter, ParameterWakePolicy};
pub use waiter::{Interrupt, WaitOutcome};

pub(crate) use waiter::WaitTable;
