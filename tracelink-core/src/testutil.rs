//! Shared test fixtures
//!
//! One tenant/project pair per fixture; every helper inserts the entity
//! it returns so tests only spell out what they assert on.

use chrono::Utc;
use uuid::Uuid;

use crate::models::*;
use crate::store::{Entity, EntityStore, MemoryStore};

pub struct Fixture {
    pub store: MemoryStore,
    pub tenant: Uuid,
    pub project: Uuid,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            tenant: Uuid::new_v4(),
            project: Uuid::new_v4(),
        }
    }

    pub fn insert_node(&self, node: ScopeNode) {
        self.store.insert(Entity::ScopeNode(node)).unwrap();
    }

    pub fn node(&self, level: ScopeLevel, code: &str, parent: Option<Uuid>) -> ScopeNode {
        let mut node = ScopeNode::new(level, code, code, self.tenant, self.project);
        node.parent_id = parent;
        self.insert_node(node.clone());
        node
    }

    pub fn requirement(&self, code: &str, title: &str) -> Requirement {
        let req = Requirement::new(code, title, self.tenant, self.project);
        self.store.insert(Entity::Requirement(req.clone())).unwrap();
        req
    }

    pub fn implementation_item(&self, code: &str, requirement_id: Uuid) -> ImplementationItem {
        let item = ImplementationItem {
            id: Uuid::new_v4(),
            code: code.to_string(),
            title: format!("Item {}", code),
            item_kind: ItemKind::Backlog,
            status: ItemStatus::Open,
            requirement_id,
            tenant_id: self.tenant,
            project_id: self.project,
        };
        self.store
            .insert(Entity::ImplementationItem(item.clone()))
            .unwrap();
        item
    }

    pub fn functional_spec(&self, title: &str, item_id: Uuid) -> FunctionalSpec {
        let spec = FunctionalSpec {
            id: Uuid::new_v4(),
            title: title.to_string(),
            implementation_item_id: item_id,
            status: ItemStatus::Open,
        };
        self.store
            .insert(Entity::FunctionalSpec(spec.clone()))
            .unwrap();
        spec
    }

    pub fn technical_spec(&self, title: &str, functional_spec_id: Uuid) -> TechnicalSpec {
        let spec = TechnicalSpec {
            id: Uuid::new_v4(),
            title: title.to_string(),
            functional_spec_id,
            status: ItemStatus::Open,
        };
        self.store
            .insert(Entity::TechnicalSpec(spec.clone()))
            .unwrap();
        spec
    }

    pub fn test_case_for_requirement(&self, code: &str, requirement_id: Uuid) -> TestCase {
        self.test_case(code, TraceLink::requirement(requirement_id))
    }

    pub fn test_case_for_item(&self, code: &str, item_id: Uuid) -> TestCase {
        self.test_case(code, TraceLink::implementation_item(item_id))
    }

    fn test_case(&self, code: &str, trace: TraceLink) -> TestCase {
        let test = TestCase {
            id: Uuid::new_v4(),
            code: code.to_string(),
            title: format!("Test {}", code),
            status: TestStatus::NotRun,
            trace,
            tenant_id: self.tenant,
            project_id: self.project,
        };
        self.store.insert(Entity::TestCase(test.clone())).unwrap();
        test
    }

    pub fn defect_on_test(&self, code: &str, test_case_id: Uuid) -> Defect {
        let defect = Defect {
            id: Uuid::new_v4(),
            code: code.to_string(),
            title: format!("Defect {}", code),
            severity: DefectSeverity::Medium,
            status: DefectStatus::Open,
            test_case_id: Some(test_case_id),
            requirement_id: None,
            tenant_id: self.tenant,
            project_id: self.project,
        };
        self.store.insert(Entity::Defect(defect.clone())).unwrap();
        defect
    }

    pub fn open_item(&self, title: &str, priority: Priority) -> OpenItem {
        let item = OpenItem {
            id: Uuid::new_v4(),
            title: title.to_string(),
            priority,
            status: OpenItemStatus::Open,
            tenant_id: self.tenant,
            project_id: self.project,
        };
        self.store.insert(Entity::OpenItem(item.clone())).unwrap();
        item
    }

    pub fn link_open_item(&self, open_item_id: Uuid, requirement_id: Uuid, link_kind: LinkKind) {
        self.store
            .insert(Entity::OpenItemLink(OpenItemLink {
                id: Uuid::new_v4(),
                open_item_id,
                requirement_id,
                link_kind,
            }))
            .unwrap();
    }

    pub fn workshop(&self, code: &str, name: &str) -> Workshop {
        let workshop = Workshop {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: name.to_string(),
            scope_node_id: None,
            program_id: Uuid::new_v4(),
            tenant_id: self.tenant,
            project_id: self.project,
        };
        self.store
            .insert(Entity::Workshop(workshop.clone()))
            .unwrap();
        workshop
    }

    pub fn session(&self, workshop_id: Uuid, sequence_no: u32, is_final: bool) -> WorkshopSession {
        let session = WorkshopSession {
            id: Uuid::new_v4(),
            workshop_id,
            sequence_no,
            is_final,
        };
        self.store
            .insert(Entity::WorkshopSession(session.clone()))
            .unwrap();
        session
    }

    pub fn note(&self, kind_tag: &str, entity_id: Uuid, body: &str) -> CommentNote {
        let note = CommentNote {
            id: Uuid::new_v4(),
            body: body.to_string(),
            author: "fixture".to_string(),
            entity_kind: kind_tag.to_string(),
            entity_id,
            created_at: Utc::now(),
        };
        self.store
            .insert(Entity::CommentNote(note.clone()))
            .unwrap();
        note
    }

    pub fn program(&self, code: &str, name: &str) -> Program {
        let program = Program {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: name.to_string(),
            tenant_id: self.tenant,
            project_id: self.project,
        };
        self.store
            .insert(Entity::Program(program.clone()))
            .unwrap();
        program
    }
}
