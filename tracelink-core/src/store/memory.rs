//! In-memory entity store
//!
//! Backs tests and fixture-driven runs. A single mutex makes every
//! operation, including the per-node read-modify-write, atomic.

use anyhow::Result;
use std::sync::Mutex;
use uuid::Uuid;

use super::{Entity, EntityStore, Snapshot};
use crate::models::ScopeNode;
use crate::registry::EntityKind;

/// Mutex-protected entity list, insertion-ordered
pub struct MemoryStore {
    entities: Mutex<Vec<Entity>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self {
            entities: Mutex::new(Vec::new()),
        }
    }

    /// Creates a store pre-loaded from a snapshot
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            entities: Mutex::new(snapshot.into_entities()),
        }
    }

    /// Copies the current contents into a snapshot
    pub fn to_snapshot(&self) -> Snapshot {
        let entities = self.entities.lock().unwrap();
        let mut snapshot = Snapshot::new();
        for entity in entities.iter() {
            snapshot.push(entity.clone());
        }
        snapshot
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore for MemoryStore {
    fn get(&self, kind: EntityKind, id: Uuid) -> Result<Option<Entity>> {
        let entities = self.entities.lock().unwrap();
        Ok(entities
            .iter()
            .find(|e| e.kind() == kind && e.id() == id)
            .cloned())
    }

    fn filter(&self, kind: EntityKind, pred: &dyn Fn(&Entity) -> bool) -> Result<Vec<Entity>> {
        let entities = self.entities.lock().unwrap();
        Ok(entities
            .iter()
            .filter(|e| e.kind() == kind && pred(e))
            .cloned()
            .collect())
    }

    fn insert(&self, entity: Entity) -> Result<()> {
        let mut entities = self.entities.lock().unwrap();
        if let Some(pos) = entities
            .iter()
            .position(|e| e.kind() == entity.kind() && e.id() == entity.id())
        {
            entities[pos] = entity;
        } else {
            entities.push(entity);
        }
        Ok(())
    }

    fn update_scope_node(
        &self,
        id: Uuid,
        apply: &dyn Fn(&mut ScopeNode),
    ) -> Result<Option<ScopeNode>> {
        let mut entities = self.entities.lock().unwrap();
        for entity in entities.iter_mut() {
            if let Entity::ScopeNode(node) = entity {
                if node.id == id {
                    apply(node);
                    node.version += 1;
                    return Ok(Some(node.clone()));
                }
            }
        }
        Ok(None)
    }
}
