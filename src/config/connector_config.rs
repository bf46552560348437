use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::Value;

/// One `[connectors.<name>]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    #[serde(default)]
    pub description: Option<String>,

    /// Defaults applied on every `init`, overridden by script-supplied pairs
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,

    /// Simulated drain time of the loopback transport, in milliseconds
    #[serde(default)]
    pub drain_ms: u64,
}
