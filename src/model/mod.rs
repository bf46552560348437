/// System entity model
///
/// Entities (parameters, events, activities) are addressed by slash-delimited
/// paths and resolved once to stable [`EntityId`]s.
pub mod path;
pub mod resolver;
pub mod system_model;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

pub use path::EntityPath;
pub use resolver::EntityResolver;
pub use system_model::{EntityDefinition, SystemModel};

/// Opaque stable handle for a resolved entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

impl EntityId {
    pub(crate) fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Parameter,
    Event,
    Activity,
    /// Grouping node with no data of its own
    Container,
}

/// Resolved entity as returned to scripts by `system_entity(path)`
#[derive(Debug, Clone, PartialEq)]
pub struct SystemEntity {
    pub id: EntityId,
    pub path: EntityPath,
    pub kind: EntityKind,
    pub description: Option<String>,
}

/// Scalar value carried by samples, activity arguments and connector properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Numeric view of integers and reals
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// One timestamped reading of a parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSample {
    pub id: EntityId,
    pub value: Value,
    pub generation_time: DateTime<Utc>,
    pub valid: bool,
}

impl ParameterSample {
    pub fn new(id: EntityId, value: Value) -> Self {
        Self {
            id,
            value,
            generation_time: Utc::now(),
            valid: true,
        }
    }
}

/// One discrete instance of an event being raised
#[derive(Debug, Clone, PartialEq)]
pub struct EventOccurrence {
    pub id: EntityId,
    pub qualifier: Option<String>,
    pub report: Option<String>,
    /// Name of the script (or feed) that raised it
    pub source: Option<String>,
    pub occurrence_time: DateTime<Utc>,
}

/// Severity of an operator message emitted by a script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Severity {
    Info,
    Warning,
    Alarm,
}
