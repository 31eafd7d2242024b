//! Traceability gap detection
//!
//! Each kind carries an ordered checklist of expected-next-hop rules.
//! A rule only runs once the previous level exists, so an entity with
//! nothing downstream reports the single gap where its chain stops.
//! Every optional hop is existence-checked before it is referenced.

use anyhow::Result;
use uuid::Uuid;

use crate::registry::EntityKind;
use crate::store::{Entity, EntityStore};
use crate::trace::Gap;

/// Runs the checklist for the entity's kind
pub fn detect(store: &dyn EntityStore, root: &Entity) -> Result<Vec<Gap>> {
    match root {
        Entity::Requirement(req) => requirement_gaps(store, req.id, &req.code),
        Entity::ImplementationItem(item) => item_gaps(store, item.id, &item.code),
        Entity::FunctionalSpec(spec) => functional_spec_gaps(store, spec.id, &spec.title),
        Entity::TestCase(test) => {
            if test.trace.requirement_id.is_none()
                && test.trace.implementation_item_id.is_none()
                && test.trace.scope_node_id.is_none()
            {
                Ok(vec![Gap {
                    level: 1,
                    message: format!("test case {} has no trace link", test.code),
                }])
            } else {
                Ok(Vec::new())
            }
        }
        Entity::ScopeNode(node) => {
            if !node.level.is_leaf() {
                return Ok(Vec::new());
            }
            let has_requirement = !store
                .filter(EntityKind::Requirement, &|e| {
                    e.as_requirement().map_or(false, |r| {
                        r.scope_node_id == Some(node.id) || r.process_step_id == Some(node.id)
                    })
                })?
                .is_empty();
            let has_test = !store
                .filter(EntityKind::TestCase, &|e| {
                    e.as_test_case()
                        .map_or(false, |t| t.trace.scope_node_id == Some(node.id))
                })?
                .is_empty();
            if !has_requirement && !has_test {
                Ok(vec![Gap {
                    level: 2,
                    message: format!(
                        "process step {} has no requirement and no test evidence",
                        node.code
                    ),
                }])
            } else {
                Ok(Vec::new())
            }
        }
        // Defects, open items, workshops and records have no expected
        // downstream evidence.
        _ => Ok(Vec::new()),
    }
}

/// Canonical-axis checklist: implementation item at level 2, then test
/// evidence at level 3.
fn requirement_gaps(store: &dyn EntityStore, req_id: Uuid, code: &str) -> Result<Vec<Gap>> {
    let items: Vec<Uuid> = store
        .filter(EntityKind::ImplementationItem, &|e| {
            e.as_implementation_item().map_or(false, |i| i.requirement_id == req_id)
        })?
        .iter()
        .map(|e| e.id())
        .collect();

    if items.is_empty() {
        return Ok(vec![Gap {
            level: 2,
            message: format!("requirement {} has no implementation item", code),
        }]);
    }

    let has_test = !store
        .filter(EntityKind::TestCase, &|e| {
            e.as_test_case().map_or(false, |t| {
                t.trace.requirement_id == Some(req_id)
                    || t.trace
                        .implementation_item_id
                        .map_or(false, |id| items.contains(&id))
            })
        })?
        .is_empty();

    if !has_test {
        return Ok(vec![Gap {
            level: 3,
            message: format!("requirement {} has no test case", code),
        }]);
    }

    Ok(Vec::new())
}

/// Standard-axis checklist for an implementation item: functional spec
/// (level 3), technical spec (level 4), then test evidence (level 5).
fn item_gaps(store: &dyn EntityStore, item_id: Uuid, code: &str) -> Result<Vec<Gap>> {
    let specs: Vec<Uuid> = store
        .filter(EntityKind::FunctionalSpec, &|e| {
            e.as_functional_spec().map_or(false, |s| s.implementation_item_id == item_id)
        })?
        .iter()
        .map(|e| e.id())
        .collect();

    if specs.is_empty() {
        return Ok(vec![Gap {
            level: 3,
            message: format!("item {} has no functional spec", code),
        }]);
    }

    let has_tech = !store
        .filter(EntityKind::TechnicalSpec, &|e| {
            e.as_technical_spec()
                .map_or(false, |t| specs.contains(&t.functional_spec_id))
        })?
        .is_empty();
    if !has_tech {
        return Ok(vec![Gap {
            level: 4,
            message: format!("item {} has no technical spec", code),
        }]);
    }

    let has_test = !store
        .filter(EntityKind::TestCase, &|e| {
            e.as_test_case()
                .map_or(false, |t| t.trace.implementation_item_id == Some(item_id))
        })?
        .is_empty();
    if !has_test {
        return Ok(vec![Gap {
            level: 5,
            message: format!("item {} has no test case", code),
        }]);
    }

    Ok(Vec::new())
}

fn functional_spec_gaps(store: &dyn EntityStore, spec_id: Uuid, title: &str) -> Result<Vec<Gap>> {
    let has_tech = !store
        .filter(EntityKind::TechnicalSpec, &|e| {
            e.as_technical_spec().map_or(false, |t| t.functional_spec_id == spec_id)
        })?
        .is_empty();
    if !has_tech {
        return Ok(vec![Gap {
            level: 4,
            message: format!("functional spec '{}' has no technical spec", title),
        }]);
    }
    Ok(Vec::new())
}
