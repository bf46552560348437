/// Script-facing side of the bridge
///
/// Scripts are Rust types implementing [`Script`], compiled into the binary
/// and looked up through a [`ScriptRegistry`]. Each runs on its own thread
/// and reaches the monitored system through a [`ScriptManager`] session over
/// a shared [`ScriptEngine`].
pub mod abort;
pub mod engine;
pub mod manager;
pub mod registry;
pub mod runner;
pub mod script;
pub mod session;

pub use abort::AbortSignal;
pub use engine::{EngineBuilder, ScriptEngine};
pub use manager::ScriptManager;
#[cfg(test)]
pub use manager::MockScriptManager;
pub use registry::{ScriptFactory, ScriptRegistry};
pub use runner::{ScriptOutcome, ScriptRunner};
pub use script::Script;
pub use session::ScriptSession;
