use std::collections::HashMap;
use tracing::debug;

use super::{EntityId, EntityKind, EntityPath, SystemEntity, SystemModel};
use crate::error::{BridgeError, Result};

#[derive(Debug, Default)]
struct IndexNode {
    children: HashMap<String, IndexNode>,
    entity: Option<EntityId>,
}

/// Path to id resolution over a hierarchical index
///
/// The index is built once from the [`SystemModel`] and never mutated, so
/// resolution is a pure function and needs no locking. Lookup walks one
/// node per path segment.
#[derive(Debug)]
pub struct EntityResolver {
    root: IndexNode,
    /// Indexed by `EntityId::raw()`
    entities: Vec<SystemEntity>,
}

impl EntityResolver {
    /// Build the index, assigning ids in declaration order
    ///
    /// Fails with `AmbiguousPath` if two definitions share a path and with
    /// `InvalidArgument` for malformed paths.
    pub fn build(model: &SystemModel) -> Result<Self> {
        let mut root = IndexNode::default();
        let mut entities = Vec::with_capacity(model.entities.len());

        for definition in &model.entities {
            let path = EntityPath::parse(&definition.path)?;
            let id = EntityId::new(entities.len() as u32);

            let mut node = &mut root;
            for segment in path.segments() {
                node = node.children.entry(segment.to_string()).or_default();
            }

            if node.entity.is_some() {
                return Err(BridgeError::AmbiguousPath(path.to_string()));
            }
            node.entity = Some(id);

            entities.push(SystemEntity {
                id,
                path,
                kind: definition.kind,
                description: definition.description.clone(),
            });
        }

        debug!(target: "model", "Indexed {} system entities", entities.len());

        Ok(Self { root, entities })
    }

    /// Resolve a textual path to its entity id
    pub fn resolve(&self, path: &str) -> Result<EntityId> {
        let parsed =
            EntityPath::parse(path).map_err(|_| BridgeError::not_found(path.to_string()))?;
        self.resolve_path(&parsed)
    }

    pub fn resolve_path(&self, path: &EntityPath) -> Result<EntityId> {
        let mut node = &self.root;
        for segment in path.segments() {
            node = node
                .children
                .get(segment)
                .ok_or_else(|| BridgeError::not_found(path.to_string()))?;
        }
        node.entity
            .ok_or_else(|| BridgeError::not_found(path.to_string()))
    }

    /// Resolve and require a specific entity kind
    pub fn resolve_kind(&self, path: &str, kind: EntityKind) -> Result<EntityId> {
        let id = self.resolve(path)?;
        match self.entity_by_id(id) {
            Some(entity) if entity.kind == kind => Ok(id),
            _ => Err(BridgeError::not_found(format!("{} {}", kind, path))),
        }
    }

    pub fn entity(&self, path: &str) -> Result<&SystemEntity> {
        let id = self.resolve(path)?;
        self.entity_by_id(id)
            .ok_or_else(|| BridgeError::not_found(path.to_string()))
    }

    pub fn entity_by_id(&self, id: EntityId) -> Option<&SystemEntity> {
        self.entities.get(id.raw() as usize)
    }

    pub fn entities(&self) -> impl Iterator<Item = &SystemEntity> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
