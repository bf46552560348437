use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::ConnectorState;
use crate::collaborators::ConnectorTransport;
use crate::error::{BridgeError, Result};
use crate::model::Value;

struct ConnectorEntry {
    name: String,
    description: Option<String>,
    transport: Arc<dyn ConnectorTransport>,
    /// Held only for reads and single transitions, never across transport calls
    state: Mutex<ConnectorState>,
    /// Serializes init/start/stop on this connector
    operation: Mutex<()>,
    defaults: BTreeMap<String, Value>,
    properties: Mutex<BTreeMap<String, Value>>,
}

impl ConnectorEntry {
    fn state(&self) -> ConnectorState {
        *self.state.lock()
    }

    fn rejected(&self, operation: &'static str, state: ConnectorState) -> BridgeError {
        BridgeError::ConnectorState {
            name: self.name.clone(),
            operation,
            state,
        }
    }

    /// Move `from -> to` unless something (an abort) changed the state meanwhile
    fn complete(
        &self,
        operation: &'static str,
        from: ConnectorState,
        to: ConnectorState,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if *state != from {
            return Err(self.rejected(operation, *state));
        }
        *state = to;
        Ok(())
    }

    fn fail(&self, from: ConnectorState) {
        let mut state = self.state.lock();
        if *state == from {
            *state = ConnectorState::Aborted;
        }
    }
}

/// Snapshot of one connector for listings
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorInfo {
    pub name: String,
    pub description: Option<String>,
    pub state: ConnectorState,
    pub properties: BTreeMap<String, Value>,
}

/// Owns every connector's state machine
///
/// Operations on one connector are mutually exclusive; different connectors
/// never contend. `abort` and `status` skip the operation lock so they never
/// wait behind a draining `stop`.
pub struct ConnectorRegistry {
    connectors: RwLock<HashMap<String, Arc<ConnectorEntry>>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self {
            connectors: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connector in `Uninitialized`
    pub fn register(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        defaults: BTreeMap<String, Value>,
        transport: Arc<dyn ConnectorTransport>,
    ) -> Result<()> {
        let name = name.into();
        let mut connectors = self.connectors.write();
        if connectors.contains_key(&name) {
            return Err(BridgeError::InvalidArgument(format!(
                "connector {} already registered",
                name
            )));
        }

        debug!(target: "connector", "Registering connector {}", name);
        connectors.insert(
            name.clone(),
            Arc::new(ConnectorEntry {
                name,
                description,
                transport,
                state: Mutex::new(ConnectorState::Uninitialized),
                operation: Mutex::new(()),
                properties: Mutex::new(defaults.clone()),
                defaults,
            }),
        );
        Ok(())
    }

    fn entry(&self, name: &str) -> Result<Arc<ConnectorEntry>> {
        self.connectors
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::not_found(format!("connector {}", name)))
    }

    /// Apply configuration and move to `Initialized`
    ///
    /// `keys[i]` is paired with `values[i]` and overrides the configured
    /// defaults. Valid from `Uninitialized`, `Stopped` and `Aborted`.
    pub fn init(&self, name: &str, keys: &[String], values: &[Value]) -> Result<()> {
        if keys.len() != values.len() {
            return Err(BridgeError::InvalidArgument(format!(
                "connector {}: {} keys but {} values",
                name,
                keys.len(),
                values.len()
            )));
        }

        let entry = self.entry(name)?;
        let _operation = entry.operation.lock();

        let current = entry.state();
        if !current.can_init() {
            return Err(entry.rejected("init", current));
        }

        let mut properties = entry.defaults.clone();
        properties.extend(keys.iter().cloned().zip(values.iter().cloned()));

        entry.transport.initialise(&properties).map_err(|e| {
            error!(target: "connector", "Connector {} rejected configuration: {:#}", name, e);
            BridgeError::collaborator("connector transport", e)
        })?;

        *entry.properties.lock() = properties;
        entry.complete("init", current, ConnectorState::Initialized)?;
        info!(target: "connector", "Connector {} initialised", name);
        Ok(())
    }

    /// `Initialized -> Running`; a second start is rejected
    pub fn start(&self, name: &str) -> Result<()> {
        let entry = self.entry(name)?;
        let _operation = entry.operation.lock();

        let current = entry.state();
        if !current.can_start() {
            return Err(entry.rejected("start", current));
        }

        if let Err(e) = entry.transport.connect() {
            error!(target: "connector", "Connector {} failed to connect: {:#}", name, e);
            entry.fail(ConnectorState::Initialized);
            return Err(BridgeError::collaborator("connector transport", e));
        }

        if let Err(e) =
            entry.complete("start", ConnectorState::Initialized, ConnectorState::Running)
        {
            // Aborted while connecting; do not leave the link up
            entry.transport.abort();
            return Err(e);
        }
        info!(target: "connector", "Connector {} started", name);
        Ok(())
    }

    /// `Running -> Stopped`, blocking until the transport has drained
    pub fn stop(&self, name: &str) -> Result<()> {
        let entry = self.entry(name)?;
        let _operation = entry.operation.lock();

        let current = entry.state();
        if !current.can_stop() {
            return Err(entry.rejected("stop", current));
        }

        debug!(target: "connector", "Draining connector {}", name);
        if let Err(e) = entry.transport.disconnect() {
            error!(target: "connector", "Connector {} failed to disconnect: {:#}", name, e);
            entry.fail(ConnectorState::Running);
            return Err(BridgeError::collaborator("connector transport", e));
        }

        entry.complete("stop", ConnectorState::Running, ConnectorState::Stopped)?;
        info!(target: "connector", "Connector {} stopped", name);
        Ok(())
    }

    /// Immediate transition to `Aborted` from `Running` or `Initialized`
    pub fn abort(&self, name: &str) -> Result<()> {
        let entry = self.entry(name)?;

        {
            let mut state = entry.state.lock();
            if !state.can_abort() {
                return Err(entry.rejected("abort", *state));
            }
            *state = ConnectorState::Aborted;
        }

        warn!(target: "connector", "Connector {} aborted", name);
        entry.transport.abort();
        Ok(())
    }

    /// Current state; never blocks behind a running operation
    pub fn status(&self, name: &str) -> Result<ConnectorState> {
        Ok(self.entry(name)?.state())
    }

    /// Called by a transport that lost its link
    ///
    /// Moves a `Running` or `Initialized` connector to `Aborted`; other states
    /// are left alone. Returns the resulting state.
    pub fn report_failure(&self, name: &str, reason: &str) -> Result<ConnectorState> {
        let entry = self.entry(name)?;
        let mut state = entry.state.lock();
        if state.can_abort() {
            warn!(target: "connector", "Connector {} failed: {}", name, reason);
            *state = ConnectorState::Aborted;
        }
        Ok(*state)
    }

    pub fn info(&self, name: &str) -> Result<ConnectorInfo> {
        let entry = self.entry(name)?;
        let properties = entry.properties.lock().clone();
        Ok(ConnectorInfo {
            name: entry.name.clone(),
            description: entry.description.clone(),
            state: entry.state(),
            properties,
        })
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connectors.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
