//! Per-kind upstream and downstream walkers
//!
//! Hard contract: a foreign key that references a missing row drops that
//! hop and the walk continues. Walks over parent pointers carry a visited
//! set so a corrupted (cyclic) hierarchy still terminates. The only error
//! path out of a walker is a store failure.

use anyhow::Result;
use std::collections::HashSet;
use uuid::Uuid;

use crate::registry::EntityKind;
use crate::store::{self, Entity, EntityStore};
use crate::trace::Hop;

/// Tracks which (kind, id) pairs a walk has already emitted
struct Seen(HashSet<(EntityKind, Uuid)>);

impl Seen {
    fn new(root: &Entity) -> Self {
        let mut set = HashSet::new();
        set.insert((root.kind(), root.id()));
        Seen(set)
    }

    /// True the first time a pair is offered
    fn first(&mut self, kind: EntityKind, id: Uuid) -> bool {
        self.0.insert((kind, id))
    }
}

fn push(hops: &mut Vec<Hop>, seen: &mut Seen, hop: Hop) {
    if seen.first(hop.kind, hop.id) {
        hops.push(hop);
    }
}

/// Walks scope-node parents to the root, halting on repeats
fn push_ancestors(
    store: &dyn EntityStore,
    start_parent: Option<Uuid>,
    hops: &mut Vec<Hop>,
    seen: &mut Seen,
    visited: &mut HashSet<Uuid>,
) -> Result<()> {
    let mut current = start_parent;
    while let Some(parent_id) = current {
        if !visited.insert(parent_id) {
            break;
        }
        let parent = match store.get(EntityKind::ScopeNode, parent_id)? {
            Some(entity) => entity,
            // Dangling parent pointer: stop the ancestor walk here
            None => break,
        };
        let node = match parent.as_scope_node() {
            Some(node) => node.clone(),
            None => break,
        };
        push(
            hops,
            seen,
            Hop::of(&parent).with("level", node.level),
        );
        current = node.parent_id;
    }
    Ok(())
}

/// Walker that contributes nothing (kinds with one empty direction)
pub fn no_hops(_store: &dyn EntityStore, _root: &Entity) -> Result<Vec<Hop>> {
    Ok(Vec::new())
}

// =========================================================================
// Scope hierarchy
// =========================================================================

pub fn scope_node_upstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let node = match root.as_scope_node() {
        Some(node) => node,
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);
    let mut visited: HashSet<Uuid> = HashSet::from([node.id]);
    push_ancestors(store, node.parent_id, &mut hops, &mut seen, &mut visited)?;
    Ok(hops)
}

pub fn scope_node_downstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let node = match root.as_scope_node() {
        Some(node) => node.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);

    // Direct children
    let mut children: Vec<_> = store
        .filter(EntityKind::ScopeNode, &|e| {
            e.as_scope_node().map_or(false, |n| n.parent_id == Some(node.id))
        })?
        .into_iter()
        .filter_map(|e| e.as_scope_node().cloned())
        .collect();
    children.sort_by(|a, b| a.code.cmp(&b.code));
    for child in &children {
        push(
            &mut hops,
            &mut seen,
            Hop::of(&Entity::ScopeNode(child.clone()))
                .with("level", child.level)
                .with("scope_status", child.scope_status),
        );
    }

    // Requirements scoped to this node (directly or as process step)
    let mut reqs: Vec<_> = store
        .filter(EntityKind::Requirement, &|e| {
            e.as_requirement().map_or(false, |r| {
                r.scope_node_id == Some(node.id) || r.process_step_id == Some(node.id)
            })
        })?
        .into_iter()
        .filter_map(|e| e.as_requirement().cloned())
        .collect();
    reqs.sort_by(|a, b| a.code.cmp(&b.code));
    for req in &reqs {
        push(
            &mut hops,
            &mut seen,
            Hop::of(&Entity::Requirement(req.clone()))
                .with("status", req.status)
                .with("priority", req.priority),
        );
    }

    // Test cases tracing straight to the node
    for entity in store.filter(EntityKind::TestCase, &|e| {
        e.as_test_case().map_or(false, |t| t.trace.scope_node_id == Some(node.id))
    })? {
        let status = entity.as_test_case().map(|t| t.status);
        let mut hop = Hop::of(&entity);
        if let Some(status) = status {
            hop = hop.with("status", status);
        }
        push(&mut hops, &mut seen, hop);
    }

    // Decisions recorded against an L4 step
    if node.level.is_leaf() {
        for entity in store.filter(EntityKind::DecisionRecord, &|e| {
            e.as_decision_record().map_or(false, |d| d.process_step_id == node.id)
        })? {
            push(&mut hops, &mut seen, Hop::of(&entity));
        }
    }

    Ok(hops)
}

// =========================================================================
// Requirement
// =========================================================================

pub fn requirement_upstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let req = match root.as_requirement() {
        Some(req) => req.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);
    let mut visited: HashSet<Uuid> = HashSet::new();

    if let Some(workshop_id) = req.workshop_id {
        if let Some(workshop) = store.get(EntityKind::Workshop, workshop_id)? {
            push(&mut hops, &mut seen, Hop::of(&workshop));
        }
    }

    for node_id in [req.process_step_id, req.scope_node_id].into_iter().flatten() {
        if let Some(entity) = store.get(EntityKind::ScopeNode, node_id)? {
            if let Some(node) = entity.as_scope_node().cloned() {
                visited.insert(node.id);
                push(&mut hops, &mut seen, Hop::of(&entity).with("level", node.level));
                push_ancestors(store, node.parent_id, &mut hops, &mut seen, &mut visited)?;
            }
        }
    }

    Ok(hops)
}

pub fn requirement_downstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let req = match root.as_requirement() {
        Some(req) => req.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);

    let mut items: Vec<_> = store
        .filter(EntityKind::ImplementationItem, &|e| {
            e.as_implementation_item().map_or(false, |i| i.requirement_id == req.id)
        })?
        .into_iter()
        .filter_map(|e| e.as_implementation_item().cloned())
        .collect();
    items.sort_by(|a, b| a.code.cmp(&b.code));

    for item in &items {
        push(
            &mut hops,
            &mut seen,
            Hop::of(&Entity::ImplementationItem(item.clone()))
                .with("item_kind", item.item_kind)
                .with("status", item.status),
        );
        push_spec_pair(store, item.id, &mut hops, &mut seen)?;
        push_tests_and_defects_for_item(store, item.id, &mut hops, &mut seen)?;
    }

    // Tests tracing straight to the requirement
    for entity in store.filter(EntityKind::TestCase, &|e| {
        e.as_test_case().map_or(false, |t| t.trace.requirement_id == Some(req.id))
    })? {
        if let Some(test) = entity.as_test_case().cloned() {
            push(&mut hops, &mut seen, Hop::of(&entity).with("status", test.status));
            push_defects_for_test(store, test.id, &mut hops, &mut seen)?;
        }
    }

    // Defects raised directly against the requirement
    for entity in store.filter(EntityKind::Defect, &|e| {
        e.as_defect().map_or(false, |d| d.requirement_id == Some(req.id))
    })? {
        if let Some(defect) = entity.as_defect() {
            let hop = Hop::of(&entity)
                .with("severity", defect.severity)
                .with("status", defect.status);
            push(&mut hops, &mut seen, hop);
        }
    }

    Ok(hops)
}

/// Functional spec then technical spec for one implementation item.
/// Either half of the pair may be missing; whatever exists is emitted.
fn push_spec_pair(
    store: &dyn EntityStore,
    item_id: Uuid,
    hops: &mut Vec<Hop>,
    seen: &mut Seen,
) -> Result<()> {
    let specs = store.filter(EntityKind::FunctionalSpec, &|e| {
        e.as_functional_spec().map_or(false, |s| s.implementation_item_id == item_id)
    })?;
    for entity in specs {
        let spec = match entity.as_functional_spec() {
            Some(spec) => spec.clone(),
            None => continue,
        };
        push(hops, seen, Hop::of(&entity).with("status", spec.status));
        for tech in store.filter(EntityKind::TechnicalSpec, &|e| {
            e.as_technical_spec().map_or(false, |t| t.functional_spec_id == spec.id)
        })? {
            let status = tech.as_technical_spec().map(|t| t.status);
            let mut hop = Hop::of(&tech);
            if let Some(status) = status {
                hop = hop.with("status", status);
            }
            push(hops, seen, hop);
        }
    }
    Ok(())
}

fn push_tests_and_defects_for_item(
    store: &dyn EntityStore,
    item_id: Uuid,
    hops: &mut Vec<Hop>,
    seen: &mut Seen,
) -> Result<()> {
    for entity in store.filter(EntityKind::TestCase, &|e| {
        e.as_test_case().map_or(false, |t| t.trace.implementation_item_id == Some(item_id))
    })? {
        if let Some(test) = entity.as_test_case().cloned() {
            push(hops, seen, Hop::of(&entity).with("status", test.status));
            push_defects_for_test(store, test.id, hops, seen)?;
        }
    }
    Ok(())
}

fn push_defects_for_test(
    store: &dyn EntityStore,
    test_id: Uuid,
    hops: &mut Vec<Hop>,
    seen: &mut Seen,
) -> Result<()> {
    for entity in store.filter(EntityKind::Defect, &|e| {
        e.as_defect().map_or(false, |d| d.test_case_id == Some(test_id))
    })? {
        if let Some(defect) = entity.as_defect() {
            let hop = Hop::of(&entity)
                .with("severity", defect.severity)
                .with("status", defect.status);
            push(hops, seen, hop);
        }
    }
    Ok(())
}

// =========================================================================
// Implementation item and spec pair
// =========================================================================

pub fn implementation_item_upstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let item = match root.as_implementation_item() {
        Some(item) => item.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);

    let req = match store::requirement(store, item.requirement_id)? {
        Some(req) => req,
        // Dangling requirement link: the item stands alone
        None => return Ok(hops),
    };
    push(
        &mut hops,
        &mut seen,
        Hop::of(&Entity::Requirement(req.clone()))
            .with("status", req.status)
            .with("priority", req.priority),
    );

    if let Some(workshop_id) = req.workshop_id {
        if let Some(workshop) = store.get(EntityKind::Workshop, workshop_id)? {
            push(&mut hops, &mut seen, Hop::of(&workshop));
        }
    }
    let mut visited = HashSet::new();
    for node_id in [req.process_step_id, req.scope_node_id].into_iter().flatten() {
        if let Some(entity) = store.get(EntityKind::ScopeNode, node_id)? {
            if let Some(node) = entity.as_scope_node().cloned() {
                visited.insert(node.id);
                push(&mut hops, &mut seen, Hop::of(&entity).with("level", node.level));
                push_ancestors(store, node.parent_id, &mut hops, &mut seen, &mut visited)?;
            }
        }
    }

    Ok(hops)
}

pub fn implementation_item_downstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let item = match root.as_implementation_item() {
        Some(item) => item.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);
    push_spec_pair(store, item.id, &mut hops, &mut seen)?;
    push_tests_and_defects_for_item(store, item.id, &mut hops, &mut seen)?;
    Ok(hops)
}

pub fn functional_spec_upstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let spec = match root.as_functional_spec() {
        Some(spec) => spec.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);

    if let Some(item) = store::implementation_item(store, spec.implementation_item_id)? {
        push(
            &mut hops,
            &mut seen,
            Hop::of(&Entity::ImplementationItem(item.clone())).with("item_kind", item.item_kind),
        );
        if let Some(req) = store::requirement(store, item.requirement_id)? {
            push(
                &mut hops,
                &mut seen,
                Hop::of(&Entity::Requirement(req.clone())).with("status", req.status),
            );
        }
    }
    Ok(hops)
}

pub fn functional_spec_downstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let spec = match root.as_functional_spec() {
        Some(spec) => spec.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);
    for tech in store.filter(EntityKind::TechnicalSpec, &|e| {
        e.as_technical_spec().map_or(false, |t| t.functional_spec_id == spec.id)
    })? {
        push(&mut hops, &mut seen, Hop::of(&tech));
    }
    Ok(hops)
}

pub fn technical_spec_upstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let spec = match root.as_technical_spec() {
        Some(spec) => spec.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);

    let functional = match store.get(EntityKind::FunctionalSpec, spec.functional_spec_id)? {
        Some(entity) => entity,
        None => return Ok(hops),
    };
    push(&mut hops, &mut seen, Hop::of(&functional));
    if let Some(fs) = functional.as_functional_spec() {
        if let Some(item) = store::implementation_item(store, fs.implementation_item_id)? {
            push(&mut hops, &mut seen, Hop::of(&Entity::ImplementationItem(item)));
        }
    }
    Ok(hops)
}

// =========================================================================
// Test cases and defects
// =========================================================================

pub fn test_case_upstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let test = match root.as_test_case() {
        Some(test) => test.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);

    if let Some(req_id) = test.trace.requirement_id {
        if let Some(req) = store::requirement(store, req_id)? {
            push(
                &mut hops,
                &mut seen,
                Hop::of(&Entity::Requirement(req.clone())).with("status", req.status),
            );
        }
    }
    if let Some(item_id) = test.trace.implementation_item_id {
        if let Some(item) = store::implementation_item(store, item_id)? {
            push(
                &mut hops,
                &mut seen,
                Hop::of(&Entity::ImplementationItem(item.clone())).with("item_kind", item.item_kind),
            );
            if let Some(req) = store::requirement(store, item.requirement_id)? {
                push(&mut hops, &mut seen, Hop::of(&Entity::Requirement(req)));
            }
        }
    }
    if let Some(node_id) = test.trace.scope_node_id {
        if let Some(entity) = store.get(EntityKind::ScopeNode, node_id)? {
            if let Some(node) = entity.as_scope_node() {
                let hop = Hop::of(&entity).with("level", node.level);
                push(&mut hops, &mut seen, hop);
            }
        }
    }
    Ok(hops)
}

pub fn test_case_downstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let test = match root.as_test_case() {
        Some(test) => test.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);
    push_defects_for_test(store, test.id, &mut hops, &mut seen)?;
    Ok(hops)
}

pub fn defect_upstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let defect = match root.as_defect() {
        Some(defect) => defect.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);

    if let Some(test_id) = defect.test_case_id {
        // A deleted test case drops this hop; the requirement link below
        // is still walked.
        if let Some(test) = store::test_case(store, test_id)? {
            push(
                &mut hops,
                &mut seen,
                Hop::of(&Entity::TestCase(test.clone())).with("status", test.status),
            );
            if let Some(req_id) = test.trace.requirement_id {
                if let Some(req) = store::requirement(store, req_id)? {
                    push(&mut hops, &mut seen, Hop::of(&Entity::Requirement(req)));
                }
            }
            if let Some(item_id) = test.trace.implementation_item_id {
                if let Some(item) = store::implementation_item(store, item_id)? {
                    push(&mut hops, &mut seen, Hop::of(&Entity::ImplementationItem(item)));
                }
            }
        }
    }
    if let Some(req_id) = defect.requirement_id {
        if let Some(req) = store::requirement(store, req_id)? {
            push(
                &mut hops,
                &mut seen,
                Hop::of(&Entity::Requirement(req.clone())).with("status", req.status),
            );
        }
    }
    Ok(hops)
}

// =========================================================================
// Open items, workshops, records
// =========================================================================

pub fn open_item_upstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let item = match root.as_open_item() {
        Some(item) => item.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);

    for entity in store.filter(EntityKind::OpenItemLink, &|e| {
        e.as_open_item_link().map_or(false, |l| l.open_item_id == item.id)
    })? {
        let link = match entity.as_open_item_link() {
            Some(link) => link.clone(),
            None => continue,
        };
        if let Some(req) = store::requirement(store, link.requirement_id)? {
            push(
                &mut hops,
                &mut seen,
                Hop::of(&Entity::Requirement(req)).with("link_kind", link.link_kind),
            );
        }
    }
    Ok(hops)
}

pub fn open_item_link_upstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let link = match root.as_open_item_link() {
        Some(link) => link.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);
    if let Some(entity) = store.get(EntityKind::OpenItem, link.open_item_id)? {
        push(&mut hops, &mut seen, Hop::of(&entity));
    }
    if let Some(req) = store::requirement(store, link.requirement_id)? {
        push(&mut hops, &mut seen, Hop::of(&Entity::Requirement(req)));
    }
    Ok(hops)
}

pub fn workshop_upstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let workshop = match root.as_workshop() {
        Some(workshop) => workshop.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);
    if let Some(node_id) = workshop.scope_node_id {
        if let Some(entity) = store.get(EntityKind::ScopeNode, node_id)? {
            push(&mut hops, &mut seen, Hop::of(&entity));
        }
    }
    if let Some(program) = store.get(EntityKind::Program, workshop.program_id)? {
        push(&mut hops, &mut seen, Hop::of(&program));
    }
    Ok(hops)
}

pub fn workshop_downstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let workshop = match root.as_workshop() {
        Some(workshop) => workshop.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);

    let mut sessions: Vec<_> = store
        .filter(EntityKind::WorkshopSession, &|e| {
            e.as_workshop_session().map_or(false, |s| s.workshop_id == workshop.id)
        })?
        .into_iter()
        .filter_map(|e| e.as_workshop_session().cloned())
        .collect();
    sessions.sort_by_key(|s| s.sequence_no);
    for session in &sessions {
        push(
            &mut hops,
            &mut seen,
            Hop::of(&Entity::WorkshopSession(session.clone())).with("is_final", session.is_final),
        );
    }

    for entity in store.filter(EntityKind::Requirement, &|e| {
        e.as_requirement().map_or(false, |r| r.workshop_id == Some(workshop.id))
    })? {
        if let Some(req) = entity.as_requirement() {
            let hop = Hop::of(&entity).with("status", req.status);
            push(&mut hops, &mut seen, hop);
        }
    }
    Ok(hops)
}

pub fn workshop_session_upstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let session = match root.as_workshop_session() {
        Some(session) => session.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);
    if let Some(workshop) = store.get(EntityKind::Workshop, session.workshop_id)? {
        push(&mut hops, &mut seen, Hop::of(&workshop));
    }
    Ok(hops)
}

pub fn decision_record_upstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let record = match root.as_decision_record() {
        Some(record) => record.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);
    if let Some(entity) = store.get(EntityKind::ScopeNode, record.process_step_id)? {
        push(&mut hops, &mut seen, Hop::of(&entity));
    }
    Ok(hops)
}

pub fn comment_note_upstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let note = match root.as_comment_note() {
        Some(note) => note.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);
    // The stored tag may be stale; an unknown tag or deleted target just
    // yields an empty walk.
    if let Ok(kind) = EntityKind::parse(&note.entity_kind) {
        if let Some(entity) = store.get(kind, note.entity_id)? {
            push(&mut hops, &mut seen, Hop::of(&entity));
        }
    }
    Ok(hops)
}

pub fn program_downstream(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Hop>> {
    let program = match root.as_program() {
        Some(program) => program.clone(),
        None => return Ok(Vec::new()),
    };
    let mut hops = Vec::new();
    let mut seen = Seen::new(root);
    let mut workshops: Vec<_> = store
        .filter(EntityKind::Workshop, &|e| {
            e.as_workshop().map_or(false, |w| w.program_id == program.id)
        })?
        .into_iter()
        .filter_map(|e| e.as_workshop().cloned())
        .collect();
    workshops.sort_by(|a, b| a.code.cmp(&b.code));
    for workshop in workshops {
        push(&mut hops, &mut seen, Hop::of(&Entity::Workshop(workshop)));
    }
    Ok(hops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use crate::testutil;

    fn hop_kinds(hops: &[Hop]) -> Vec<EntityKind> {
        hops.iter().map(|h| h.kind).collect()
    }

    #[test]
    fn test_defect_with_deleted_test_case_degrades() {
        let fx = testutil::Fixture::new();
        let req = fx.requirement("REQ-010", "Pricing procedure");
        // Defect pointing at a test case id that was never stored
        let defect = Defect {
            id: Uuid::new_v4(),
            code: "DEF-001".to_string(),
            title: "Wrong price".to_string(),
            severity: DefectSeverity::High,
            status: DefectStatus::Open,
            test_case_id: Some(Uuid::new_v4()),
            requirement_id: Some(req.id),
            tenant_id: fx.tenant,
            project_id: fx.project,
        };
        fx.store.insert(Entity::Defect(defect.clone())).unwrap();

        let hops = defect_upstream(&fx.store, &Entity::Defect(defect)).unwrap();
        // The dangling test hop is omitted, the requirement hop survives
        assert!(!hop_kinds(&hops).contains(&EntityKind::TestCase));
        assert!(hop_kinds(&hops).contains(&EntityKind::Requirement));
    }

    #[test]
    fn test_implementation_item_with_deleted_requirement_degrades() {
        let fx = testutil::Fixture::new();
        let item = ImplementationItem {
            id: Uuid::new_v4(),
            code: "BKL-001".to_string(),
            title: "Orphaned item".to_string(),
            item_kind: ItemKind::Backlog,
            status: ItemStatus::Open,
            requirement_id: Uuid::new_v4(),
            tenant_id: fx.tenant,
            project_id: fx.project,
        };
        fx.store
            .insert(Entity::ImplementationItem(item.clone()))
            .unwrap();

        let hops =
            implementation_item_upstream(&fx.store, &Entity::ImplementationItem(item)).unwrap();
        assert!(hops.is_empty());
    }

    #[test]
    fn test_test_case_with_deleted_trace_targets_degrades() {
        let fx = testutil::Fixture::new();
        let test = TestCase {
            id: Uuid::new_v4(),
            code: "TC-001".to_string(),
            title: "Orphaned test".to_string(),
            status: TestStatus::NotRun,
            trace: TraceLink {
                requirement_id: Some(Uuid::new_v4()),
                implementation_item_id: Some(Uuid::new_v4()),
                scope_node_id: Some(Uuid::new_v4()),
            },
            tenant_id: fx.tenant,
            project_id: fx.project,
        };
        fx.store.insert(Entity::TestCase(test.clone())).unwrap();

        let hops = test_case_upstream(&fx.store, &Entity::TestCase(test)).unwrap();
        assert!(hops.is_empty());
    }

    #[test]
    fn test_requirement_with_deleted_workshop_degrades() {
        let fx = testutil::Fixture::new();
        let mut req = fx.requirement("REQ-011", "Delivery scheduling");
        req.workshop_id = Some(Uuid::new_v4());
        fx.store.insert(Entity::Requirement(req.clone())).unwrap();

        let hops = requirement_upstream(&fx.store, &Entity::Requirement(req)).unwrap();
        assert!(!hop_kinds(&hops).contains(&EntityKind::Workshop));
    }

    #[test]
    fn test_scope_node_with_dangling_parent_degrades() {
        let fx = testutil::Fixture::new();
        let mut node = ScopeNode::new(ScopeLevel::L4, "ST-01", "Step", fx.tenant, fx.project);
        node.parent_id = Some(Uuid::new_v4());
        fx.insert_node(node.clone());

        let hops = scope_node_upstream(&fx.store, &Entity::ScopeNode(node)).unwrap();
        assert!(hops.is_empty());
    }

    #[test]
    fn test_technical_spec_with_deleted_functional_spec_degrades() {
        let fx = testutil::Fixture::new();
        let tech = TechnicalSpec {
            id: Uuid::new_v4(),
            title: "TS orphan".to_string(),
            functional_spec_id: Uuid::new_v4(),
            status: ItemStatus::Open,
        };
        fx.store.insert(Entity::TechnicalSpec(tech.clone())).unwrap();

        let hops = technical_spec_upstream(&fx.store, &Entity::TechnicalSpec(tech)).unwrap();
        assert!(hops.is_empty());
    }

    #[test]
    fn test_open_item_with_deleted_requirement_degrades() {
        let fx = testutil::Fixture::new();
        let open = OpenItem {
            id: Uuid::new_v4(),
            title: "Clarify tax code".to_string(),
            priority: Priority::P1,
            status: OpenItemStatus::Open,
            tenant_id: fx.tenant,
            project_id: fx.project,
        };
        fx.store.insert(Entity::OpenItem(open.clone())).unwrap();
        fx.store
            .insert(Entity::OpenItemLink(OpenItemLink {
                id: Uuid::new_v4(),
                open_item_id: open.id,
                requirement_id: Uuid::new_v4(),
                link_kind: LinkKind::Blocks,
            }))
            .unwrap();

        let hops = open_item_upstream(&fx.store, &Entity::OpenItem(open)).unwrap();
        assert!(hops.is_empty());
    }

    #[test]
    fn test_comment_note_with_unknown_kind_degrades() {
        let fx = testutil::Fixture::new();
        let note = CommentNote {
            id: Uuid::new_v4(),
            body: "legacy import".to_string(),
            author: "etl".to_string(),
            entity_kind: "legacy_thing".to_string(),
            entity_id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
        };
        fx.store.insert(Entity::CommentNote(note.clone())).unwrap();

        let hops = comment_note_upstream(&fx.store, &Entity::CommentNote(note)).unwrap();
        assert!(hops.is_empty());
    }

    #[test]
    fn test_requirement_downstream_full_axis_order() {
        let fx = testutil::Fixture::new();
        let req = fx.requirement("REQ-012", "Billing plan");
        let item = fx.implementation_item("BKL-050", req.id);
        let fs = fx.functional_spec("FS for billing", item.id);
        fx.technical_spec("TS for billing", fs.id);
        let test = fx.test_case_for_item("TC-300", item.id);
        fx.defect_on_test("DEF-910", test.id);

        let hops =
            requirement_downstream(&fx.store, &Entity::Requirement(req)).unwrap();
        let kinds = hop_kinds(&hops);
        assert_eq!(
            kinds,
            vec![
                EntityKind::ImplementationItem,
                EntityKind::FunctionalSpec,
                EntityKind::TechnicalSpec,
                EntityKind::TestCase,
                EntityKind::Defect,
            ]
        );
    }

    #[test]
    fn test_duplicate_evidence_emitted_once() {
        let fx = testutil::Fixture::new();
        let req = fx.requirement("REQ-013", "Output determination");
        let item = fx.implementation_item("BKL-060", req.id);
        // Same test traces to both the requirement and the item
        let test = TestCase {
            id: Uuid::new_v4(),
            code: "TC-400".to_string(),
            title: "Dual-linked test".to_string(),
            status: TestStatus::Passed,
            trace: TraceLink {
                requirement_id: Some(req.id),
                implementation_item_id: Some(item.id),
                scope_node_id: None,
            },
            tenant_id: fx.tenant,
            project_id: fx.project,
        };
        fx.store.insert(Entity::TestCase(test)).unwrap();

        let hops = requirement_downstream(&fx.store, &Entity::Requirement(req)).unwrap();
        let test_hops = hops.iter().filter(|h| h.kind == EntityKind::TestCase).count();
        assert_eq!(test_hops, 1);
    }

    #[test]
    fn test_workshop_downstream_orders_sessions() {
        let fx = testutil::Fixture::new();
        let workshop = fx.workshop("WS-01", "O2C Fit/Gap");
        fx.session(workshop.id, 2, true);
        fx.session(workshop.id, 1, false);

        let hops = workshop_downstream(&fx.store, &Entity::Workshop(workshop)).unwrap();
        let sessions: Vec<_> = hops
            .iter()
            .filter(|h| h.kind == EntityKind::WorkshopSession)
            .collect();
        assert_eq!(sessions.len(), 2);
        assert!(sessions[0].title.contains("Session 1"));
        assert!(sessions[1].title.contains("Session 2"));
        assert_eq!(sessions[1].extra.get("is_final").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_open_item_link_kind_in_extra() {
        let fx = testutil::Fixture::new();
        let req = fx.requirement("REQ-014", "Returns process");
        let open = fx.open_item("Blocking question", Priority::P1);
        fx.link_open_item(open.id, req.id, LinkKind::Blocks);

        let hops = open_item_upstream(&fx.store, &Entity::OpenItem(open)).unwrap();
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].extra.get("link_kind").map(String::as_str), Some("blocks"));
    }
}
