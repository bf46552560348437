//! Script manager engine for a telemetry monitoring-and-control system
//!
//! Automation scripts read parameters, raise and wait for events, run
//! activities, drive connector lifecycles and toggle entity monitoring. All
//! of that goes through a per-script [`scripting::ScriptManager`] session
//! over one shared [`scripting::ScriptEngine`].

pub mod activity;
pub mod collaborators;
pub mod config;
pub mod connector;
pub mod enablement;
pub mod error;
pub mod events;
pub mod logging;
pub mod loopback;
pub mod model;
pub mod scripting;
pub mod scripts;

pub use error::{BridgeError, Result};
