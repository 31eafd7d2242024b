//! Entity store abstraction
//!
//! The engine treats persistence as a generic get-by-id / filter store.
//! Three backends are provided: in-memory (tests, fixtures), YAML file
//! (single-file projects, fs2-locked writes) and SQLite (concurrent use,
//! versioned compare-and-swap on scope nodes).

mod memory;
mod sqlite;
mod yaml;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use yaml::YamlStore;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    CommentNote, DecisionRecord, Defect, FunctionalSpec, ImplementationItem, OpenItem,
    OpenItemLink, Program, Requirement, ScopeNode, TechnicalSpec, TestCase, Workshop,
    WorkshopSession,
};
use crate::registry::EntityKind;

/// Sum type over every persisted entity.
///
/// The store hands these out; walkers downcast through the `as_*`
/// accessors. Adding a variant forces the registry match and the snapshot
/// to be extended, so a new entity type cannot be half-wired.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    ScopeNode(ScopeNode),
    Requirement(Requirement),
    ImplementationItem(ImplementationItem),
    FunctionalSpec(FunctionalSpec),
    TechnicalSpec(TechnicalSpec),
    TestCase(TestCase),
    Defect(Defect),
    OpenItem(OpenItem),
    OpenItemLink(OpenItemLink),
    Workshop(Workshop),
    WorkshopSession(WorkshopSession),
    DecisionRecord(DecisionRecord),
    CommentNote(CommentNote),
    Program(Program),
}

impl Entity {
    /// The type tag of this entity
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::ScopeNode(_) => EntityKind::ScopeNode,
            Entity::Requirement(_) => EntityKind::Requirement,
            Entity::ImplementationItem(_) => EntityKind::ImplementationItem,
            Entity::FunctionalSpec(_) => EntityKind::FunctionalSpec,
            Entity::TechnicalSpec(_) => EntityKind::TechnicalSpec,
            Entity::TestCase(_) => EntityKind::TestCase,
            Entity::Defect(_) => EntityKind::Defect,
            Entity::OpenItem(_) => EntityKind::OpenItem,
            Entity::OpenItemLink(_) => EntityKind::OpenItemLink,
            Entity::Workshop(_) => EntityKind::Workshop,
            Entity::WorkshopSession(_) => EntityKind::WorkshopSession,
            Entity::DecisionRecord(_) => EntityKind::DecisionRecord,
            Entity::CommentNote(_) => EntityKind::CommentNote,
            Entity::Program(_) => EntityKind::Program,
        }
    }

    /// Unique identifier
    pub fn id(&self) -> Uuid {
        match self {
            Entity::ScopeNode(e) => e.id,
            Entity::Requirement(e) => e.id,
            Entity::ImplementationItem(e) => e.id,
            Entity::FunctionalSpec(e) => e.id,
            Entity::TechnicalSpec(e) => e.id,
            Entity::TestCase(e) => e.id,
            Entity::Defect(e) => e.id,
            Entity::OpenItem(e) => e.id,
            Entity::OpenItemLink(e) => e.id,
            Entity::Workshop(e) => e.id,
            Entity::WorkshopSession(e) => e.id,
            Entity::DecisionRecord(e) => e.id,
            Entity::CommentNote(e) => e.id,
            Entity::Program(e) => e.id,
        }
    }

    /// Human-readable title for hop summaries
    pub fn title(&self) -> String {
        match self {
            Entity::ScopeNode(e) => format!("{} {}", e.code, e.name),
            Entity::Requirement(e) => format!("{} {}", e.code, e.title),
            Entity::ImplementationItem(e) => format!("{} {}", e.code, e.title),
            Entity::FunctionalSpec(e) => e.title.clone(),
            Entity::TechnicalSpec(e) => e.title.clone(),
            Entity::TestCase(e) => format!("{} {}", e.code, e.title),
            Entity::Defect(e) => format!("{} {}", e.code, e.title),
            Entity::OpenItem(e) => e.title.clone(),
            Entity::OpenItemLink(e) => format!("{} link", e.link_kind),
            Entity::Workshop(e) => format!("{} {}", e.code, e.name),
            Entity::WorkshopSession(e) => format!("Session {}", e.sequence_no),
            Entity::DecisionRecord(e) => e.title.clone(),
            Entity::CommentNote(e) => format!("Note by {}", e.author),
            Entity::Program(e) => format!("{} {}", e.code, e.name),
        }
    }

    pub fn as_scope_node(&self) -> Option<&ScopeNode> {
        match self {
            Entity::ScopeNode(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_requirement(&self) -> Option<&Requirement> {
        match self {
            Entity::Requirement(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_implementation_item(&self) -> Option<&ImplementationItem> {
        match self {
            Entity::ImplementationItem(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_functional_spec(&self) -> Option<&FunctionalSpec> {
        match self {
            Entity::FunctionalSpec(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_technical_spec(&self) -> Option<&TechnicalSpec> {
        match self {
            Entity::TechnicalSpec(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_test_case(&self) -> Option<&TestCase> {
        match self {
            Entity::TestCase(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_defect(&self) -> Option<&Defect> {
        match self {
            Entity::Defect(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_open_item(&self) -> Option<&OpenItem> {
        match self {
            Entity::OpenItem(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_open_item_link(&self) -> Option<&OpenItemLink> {
        match self {
            Entity::OpenItemLink(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_workshop(&self) -> Option<&Workshop> {
        match self {
            Entity::Workshop(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_workshop_session(&self) -> Option<&WorkshopSession> {
        match self {
            Entity::WorkshopSession(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_decision_record(&self) -> Option<&DecisionRecord> {
        match self {
            Entity::DecisionRecord(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_comment_note(&self) -> Option<&CommentNote> {
        match self {
            Entity::CommentNote(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_program(&self) -> Option<&Program> {
        match self {
            Entity::Program(e) => Some(e),
            _ => None,
        }
    }
}

/// Generic entity store consumed by the engine.
///
/// `get` and `filter` are the only read primitives the walkers use.
/// `update_scope_node` is the per-node atomic read-modify-write required
/// by the aggregation write path: the closure runs against the current
/// row and the backend bumps the node version, so an automatic
/// recalculation racing a manual override cannot lose either write.
pub trait EntityStore: Send + Sync {
    /// Fetch a single entity; Ok(None) when no row exists
    fn get(&self, kind: EntityKind, id: Uuid) -> Result<Option<Entity>>;

    /// All entities of a kind matching the predicate, in stable store order
    fn filter(&self, kind: EntityKind, pred: &dyn Fn(&Entity) -> bool) -> Result<Vec<Entity>>;

    /// Insert or replace an entity
    fn insert(&self, entity: Entity) -> Result<()>;

    /// Atomically mutate one scope node; returns the updated node, or
    /// Ok(None) when the node does not exist. The backend bumps `version`.
    fn update_scope_node(
        &self,
        id: Uuid,
        apply: &dyn Fn(&mut ScopeNode),
    ) -> Result<Option<ScopeNode>>;
}

/// Typed lookup helpers over the generic store

pub fn scope_node(store: &dyn EntityStore, id: Uuid) -> Result<Option<ScopeNode>> {
    Ok(store
        .get(EntityKind::ScopeNode, id)?
        .and_then(|e| e.as_scope_node().cloned()))
}

pub fn requirement(store: &dyn EntityStore, id: Uuid) -> Result<Option<Requirement>> {
    Ok(store
        .get(EntityKind::Requirement, id)?
        .and_then(|e| e.as_requirement().cloned()))
}

pub fn implementation_item(store: &dyn EntityStore, id: Uuid) -> Result<Option<ImplementationItem>> {
    Ok(store
        .get(EntityKind::ImplementationItem, id)?
        .and_then(|e| e.as_implementation_item().cloned()))
}

pub fn test_case(store: &dyn EntityStore, id: Uuid) -> Result<Option<TestCase>> {
    Ok(store
        .get(EntityKind::TestCase, id)?
        .and_then(|e| e.as_test_case().cloned()))
}

pub fn workshop(store: &dyn EntityStore, id: Uuid) -> Result<Option<Workshop>> {
    Ok(store
        .get(EntityKind::Workshop, id)?
        .and_then(|e| e.as_workshop().cloned()))
}

/// Serializable snapshot of an entire store.
///
/// Used as the YAML file format and for loading test fixtures. Every
/// field defaults so partial files parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub scope_nodes: Vec<ScopeNode>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub implementation_items: Vec<ImplementationItem>,
    #[serde(default)]
    pub functional_specs: Vec<FunctionalSpec>,
    #[serde(default)]
    pub technical_specs: Vec<TechnicalSpec>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub defects: Vec<Defect>,
    #[serde(default)]
    pub open_items: Vec<OpenItem>,
    #[serde(default)]
    pub open_item_links: Vec<OpenItemLink>,
    #[serde(default)]
    pub workshops: Vec<Workshop>,
    #[serde(default)]
    pub workshop_sessions: Vec<WorkshopSession>,
    #[serde(default)]
    pub decision_records: Vec<DecisionRecord>,
    #[serde(default)]
    pub comment_notes: Vec<CommentNote>,
    #[serde(default)]
    pub programs: Vec<Program>,
}

impl Snapshot {
    /// Creates an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// All entities in the snapshot, in declaration order
    pub fn into_entities(self) -> Vec<Entity> {
        let mut out = Vec::new();
        out.extend(self.scope_nodes.into_iter().map(Entity::ScopeNode));
        out.extend(self.requirements.into_iter().map(Entity::Requirement));
        out.extend(
            self.implementation_items
                .into_iter()
                .map(Entity::ImplementationItem),
        );
        out.extend(self.functional_specs.into_iter().map(Entity::FunctionalSpec));
        out.extend(self.technical_specs.into_iter().map(Entity::TechnicalSpec));
        out.extend(self.test_cases.into_iter().map(Entity::TestCase));
        out.extend(self.defects.into_iter().map(Entity::Defect));
        out.extend(self.open_items.into_iter().map(Entity::OpenItem));
        out.extend(self.open_item_links.into_iter().map(Entity::OpenItemLink));
        out.extend(self.workshops.into_iter().map(Entity::Workshop));
        out.extend(
            self.workshop_sessions
                .into_iter()
                .map(Entity::WorkshopSession),
        );
        out.extend(self.decision_records.into_iter().map(Entity::DecisionRecord));
        out.extend(self.comment_notes.into_iter().map(Entity::CommentNote));
        out.extend(self.programs.into_iter().map(Entity::Program));
        out
    }

    /// Files an entity into the matching snapshot bucket
    pub fn push(&mut self, entity: Entity) {
        match entity {
            Entity::ScopeNode(e) => self.scope_nodes.push(e),
            Entity::Requirement(e) => self.requirements.push(e),
            Entity::ImplementationItem(e) => self.implementation_items.push(e),
            Entity::FunctionalSpec(e) => self.functional_specs.push(e),
            Entity::TechnicalSpec(e) => self.technical_specs.push(e),
            Entity::TestCase(e) => self.test_cases.push(e),
            Entity::Defect(e) => self.defects.push(e),
            Entity::OpenItem(e) => self.open_items.push(e),
            Entity::OpenItemLink(e) => self.open_item_links.push(e),
            Entity::Workshop(e) => self.workshops.push(e),
            Entity::WorkshopSession(e) => self.workshop_sessions.push(e),
            Entity::DecisionRecord(e) => self.decision_records.push(e),
            Entity::CommentNote(e) => self.comment_notes.push(e),
            Entity::Program(e) => self.programs.push(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScopeLevel, ScopeNode};

    #[test]
    fn test_entity_kind_and_id() {
        let node = ScopeNode::new(ScopeLevel::L3, "O2C-030", "Order to Cash", Uuid::new_v4(), Uuid::new_v4());
        let id = node.id;
        let entity = Entity::ScopeNode(node);
        assert_eq!(entity.kind(), EntityKind::ScopeNode);
        assert_eq!(entity.id(), id);
        assert!(entity.title().contains("O2C-030"));
    }

    #[test]
    fn test_entity_accessor_mismatch() {
        let node = ScopeNode::new(ScopeLevel::L3, "X", "Y", Uuid::new_v4(), Uuid::new_v4());
        let entity = Entity::ScopeNode(node);
        assert!(entity.as_requirement().is_none());
        assert!(entity.as_scope_node().is_some());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut snapshot = Snapshot::new();
        let node = ScopeNode::new(ScopeLevel::L1, "FIN", "Finance", Uuid::new_v4(), Uuid::new_v4());
        snapshot.push(Entity::ScopeNode(node.clone()));

        let yaml = serde_yaml::to_string(&snapshot).unwrap();
        let parsed: Snapshot = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.scope_nodes.len(), 1);
        assert_eq!(parsed.scope_nodes[0].id, node.id);
    }

    #[test]
    fn test_snapshot_partial_yaml_parses() {
        let parsed: Snapshot = serde_yaml::from_str("requirements: []").unwrap();
        assert!(parsed.scope_nodes.is_empty());
        assert!(parsed.programs.is_empty());
    }
}
