use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::info;

use crate::error::{BridgeError, Result};
use crate::model::{EntityId, EntityResolver};

/// Monitoring flags of one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnablementFlag {
    pub enabled: bool,
    pub ignored: bool,
}

impl Default for EnablementFlag {
    fn default() -> Self {
        Self {
            enabled: true,
            ignored: false,
        }
    }
}

/// Per-entity enable/disable/ignore flags
///
/// The entity set is fixed by the model, so the map itself is never locked;
/// each flag carries its own mutex.
pub struct EnablementRegistry {
    flags: HashMap<EntityId, Mutex<EnablementFlag>>,
}

impl EnablementRegistry {
    pub fn new(resolver: &EntityResolver) -> Self {
        let flags = resolver
            .entities()
            .map(|entity| (entity.id, Mutex::new(EnablementFlag::default())))
            .collect();
        Self { flags }
    }

    fn update(&self, id: EntityId, next: EnablementFlag) -> Result<EnablementFlag> {
        let slot = self
            .flags
            .get(&id)
            .ok_or_else(|| BridgeError::not_found(id.to_string()))?;
        let mut flag = slot.lock();
        if *flag != next {
            info!(
                target: "scripting",
                "Entity {} enabled={} ignored={}",
                id, next.enabled, next.ignored
            );
            *flag = next;
        }
        Ok(*flag)
    }

    pub fn enable(&self, id: EntityId) -> Result<EnablementFlag> {
        self.update(
            id,
            EnablementFlag {
                enabled: true,
                ignored: false,
            },
        )
    }

    pub fn disable(&self, id: EntityId) -> Result<EnablementFlag> {
        self.update(
            id,
            EnablementFlag {
                enabled: false,
                ignored: false,
            },
        )
    }

    /// Keep processing the entity but suppress its alarms
    pub fn ignore(&self, id: EntityId) -> Result<EnablementFlag> {
        self.update(
            id,
            EnablementFlag {
                enabled: true,
                ignored: true,
            },
        )
    }

    pub fn flag(&self, id: EntityId) -> Option<EnablementFlag> {
        self.flags.get(&id).map(|slot| *slot.lock())
    }
}
