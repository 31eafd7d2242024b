//! Lateral link resolution
//!
//! Same-axis-adjacent associations that are neither upstream nor
//! downstream: open items attached through typed links, and the decisions
//! and discussion notes reachable via the process step a requirement is
//! attached to. A missing intermediate node yields empty results.

use anyhow::Result;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{LinkKind, Requirement};
use crate::registry::EntityKind;
use crate::store::EntityStore;
use crate::trace::Hop;

/// An open item attached to a requirement, with its link type
#[derive(Debug, Clone, Serialize)]
pub struct LinkedOpenItem {
    pub hop: Hop,
    pub link_kind: LinkKind,
}

/// Lateral associations of one requirement
#[derive(Debug, Clone, Serialize, Default)]
pub struct RequirementLinks {
    pub open_items: Vec<LinkedOpenItem>,
    pub decisions: Vec<Hop>,
    pub notes: Vec<Hop>,
}

/// Resolves lateral links for a requirement. Never errors on absent
/// intermediates; only store failures propagate.
pub fn requirement_links(store: &dyn EntityStore, req: &Requirement) -> Result<RequirementLinks> {
    let mut links = RequirementLinks::default();

    // Open items via the typed many-to-many edge
    for entity in store.filter(EntityKind::OpenItemLink, &|e| {
        e.as_open_item_link().map_or(false, |l| l.requirement_id == req.id)
    })? {
        let link = match entity.as_open_item_link() {
            Some(link) => link.clone(),
            None => continue,
        };
        if let Some(item) = store.get(EntityKind::OpenItem, link.open_item_id)? {
            let status = item.as_open_item().map(|i| i.status);
            let mut hop = Hop::of(&item);
            if let Some(status) = status {
                hop = hop.with("status", status);
            }
            links.open_items.push(LinkedOpenItem {
                hop,
                link_kind: link.link_kind,
            });
        }
    }

    // Decisions and notes share the requirement's process step
    if let Some(step_id) = req.process_step_id {
        // The step itself may be gone; then there is nothing to resolve
        if store.get(EntityKind::ScopeNode, step_id)?.is_some() {
            for entity in store.filter(EntityKind::DecisionRecord, &|e| {
                e.as_decision_record().map_or(false, |d| d.process_step_id == step_id)
            })? {
                links.decisions.push(Hop::of(&entity));
            }
            links.notes = notes_for(store, EntityKind::ScopeNode, step_id)?;
        }
    }

    // Notes attached straight to the requirement
    links
        .notes
        .extend(notes_for(store, EntityKind::Requirement, req.id)?);

    Ok(links)
}

fn notes_for(store: &dyn EntityStore, kind: EntityKind, id: Uuid) -> Result<Vec<Hop>> {
    Ok(store
        .filter(EntityKind::CommentNote, &|e| {
            e.as_comment_note()
                .map_or(false, |n| n.entity_kind == kind.tag() && n.entity_id == id)
        })?
        .iter()
        .map(Hop::of)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use crate::store::Entity;
    use crate::testutil;

    #[test]
    fn test_open_items_with_link_kind() {
        let fx = testutil::Fixture::new();
        let req = fx.requirement("REQ-300", "Consignment stock");
        let blocking = fx.open_item("Legal review", Priority::P1);
        let related = fx.open_item("Nice to know", Priority::P4);
        fx.link_open_item(blocking.id, req.id, LinkKind::Blocks);
        fx.link_open_item(related.id, req.id, LinkKind::Related);

        let links = requirement_links(&fx.store, &req).unwrap();
        assert_eq!(links.open_items.len(), 2);
        assert!(links
            .open_items
            .iter()
            .any(|l| l.link_kind == LinkKind::Blocks));
        assert!(links
            .open_items
            .iter()
            .any(|l| l.link_kind == LinkKind::Related));
    }

    #[test]
    fn test_decisions_via_shared_process_step() {
        let fx = testutil::Fixture::new();
        let step = fx.node(ScopeLevel::L4, "ST-300", None);
        let mut req = fx.requirement("REQ-301", "Returns approval");
        req.process_step_id = Some(step.id);
        fx.store.insert(Entity::Requirement(req.clone())).unwrap();

        fx.store
            .insert(Entity::DecisionRecord(DecisionRecord {
                id: Uuid::new_v4(),
                title: "Approve via workflow".to_string(),
                decided_at: chrono::Utc::now(),
                process_step_id: step.id,
            }))
            .unwrap();

        let links = requirement_links(&fx.store, &req).unwrap();
        assert_eq!(links.decisions.len(), 1);
    }

    #[test]
    fn test_missing_process_step_yields_empty_not_error() {
        let fx = testutil::Fixture::new();
        let mut req = fx.requirement("REQ-302", "Dangling step");
        req.process_step_id = Some(Uuid::new_v4());
        fx.store.insert(Entity::Requirement(req.clone())).unwrap();

        let links = requirement_links(&fx.store, &req).unwrap();
        assert!(links.decisions.is_empty());
        assert!(links.open_items.is_empty());
    }

    #[test]
    fn test_notes_on_requirement_and_step() {
        let fx = testutil::Fixture::new();
        let step = fx.node(ScopeLevel::L4, "ST-301", None);
        let mut req = fx.requirement("REQ-303", "Pricing note");
        req.process_step_id = Some(step.id);
        fx.store.insert(Entity::Requirement(req.clone())).unwrap();

        fx.note("requirement", req.id, "needs CFO input");
        fx.note("scope_node", step.id, "walked through in session 2");

        let links = requirement_links(&fx.store, &req).unwrap();
        assert_eq!(links.notes.len(), 2);
    }

    #[test]
    fn test_deleted_open_item_is_skipped() {
        let fx = testutil::Fixture::new();
        let req = fx.requirement("REQ-304", "Orphan link");
        fx.link_open_item(Uuid::new_v4(), req.id, LinkKind::Blocks);

        let links = requirement_links(&fx.store, &req).unwrap();
        assert!(links.open_items.is_empty());
    }
}
