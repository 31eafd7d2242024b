//! Chain builder
//!
//! Resolves an entity by (type, id), runs the type's upstream and
//! downstream walkers, summarizes the link counts, scores chain depth
//! against the axis tables and runs gap detection. Traceability degrades
//! gracefully: broken foreign keys drop individual hops, they never abort
//! a walk.

pub mod depth;
pub mod gaps;
pub mod walkers;

use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::Result;
use crate::registry::EntityKind;
use crate::store::{Entity, EntityStore};

/// One discovered hop in a chain
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Hop {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub id: Uuid,
    pub title: String,
    /// Kind-specific descriptive fields (status, priority, link kind, ...)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Hop {
    /// Hop for an entity with no extra fields
    pub fn of(entity: &Entity) -> Self {
        Self {
            kind: entity.kind(),
            id: entity.id(),
            title: entity.title(),
            extra: BTreeMap::new(),
        }
    }

    /// Adds one descriptive field
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.extra.insert(key.to_string(), value.to_string());
        self
    }
}

/// The chain's root entity
#[derive(Debug, Clone, Serialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub id: Uuid,
    pub title: String,
}

/// A detected traceability gap
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Gap {
    /// Axis level at which the expected next hop is missing
    pub level: u32,
    pub message: String,
}

/// Merged upstream/downstream trace for one root entity
#[derive(Debug, Clone, Serialize)]
pub struct TraceChain {
    pub entity: EntityRef,
    pub upstream: Vec<Hop>,
    pub downstream: Vec<Hop>,
    /// Hop count per type tag over both directions
    pub links_summary: BTreeMap<String, usize>,
    pub chain_depth: u32,
    pub gaps: Vec<Gap>,
}

/// Builds traceability chains against a generic entity store
pub struct ChainBuilder<'a> {
    store: &'a dyn EntityStore,
}

impl<'a> ChainBuilder<'a> {
    pub fn new(store: &'a dyn EntityStore) -> Self {
        Self { store }
    }

    /// Resolves the root entity and walks both directions.
    ///
    /// Returns Ok(None) when the root row does not exist; the caller maps
    /// that to its NotFound taxonomy. Missing intermediate rows never
    /// surface here.
    pub fn build_chain(&self, kind: EntityKind, id: Uuid) -> Result<Option<TraceChain>> {
        let root = match self.store.get(kind, id)? {
            Some(entity) => entity,
            None => return Ok(None),
        };
        Ok(Some(self.build_from(&root)?))
    }

    /// Walks an already-resolved root entity
    pub fn build_from(&self, root: &Entity) -> Result<TraceChain> {
        let handlers = root.kind().handlers();
        let upstream = (handlers.upstream)(self.store, root)?;
        let downstream = (handlers.downstream)(self.store, root)?;

        let mut links_summary: BTreeMap<String, usize> = BTreeMap::new();
        for hop in upstream.iter().chain(downstream.iter()) {
            *links_summary.entry(hop.kind.tag().to_string()).or_insert(0) += 1;
        }

        let hop_kinds: Vec<EntityKind> = upstream
            .iter()
            .chain(downstream.iter())
            .map(|h| h.kind)
            .collect();
        let chain_depth = depth::chain_depth(root.kind(), &hop_kinds);

        let gaps = gaps::detect(self.store, root)?;

        Ok(TraceChain {
            entity: EntityRef {
                kind: root.kind(),
                id: root.id(),
                title: root.title(),
            },
            upstream,
            downstream,
            links_summary,
            chain_depth,
            gaps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use crate::store::MemoryStore;
    use crate::testutil;

    #[test]
    fn test_build_chain_missing_root_is_none() {
        let store = MemoryStore::new();
        let builder = ChainBuilder::new(&store);
        let chain = builder
            .build_chain(EntityKind::Requirement, Uuid::new_v4())
            .unwrap();
        assert!(chain.is_none());
    }

    #[test]
    fn test_requirement_with_no_evidence_scenario_a() {
        let fx = testutil::Fixture::new();
        let req = fx.requirement("REQ-001", "Post intercompany invoices");

        let builder = ChainBuilder::new(&fx.store);
        let chain = builder
            .build_chain(EntityKind::Requirement, req.id)
            .unwrap()
            .unwrap();

        assert_eq!(chain.chain_depth, 1);
        assert!(chain.downstream.is_empty());
        assert_eq!(chain.gaps.len(), 1);
        assert_eq!(chain.gaps[0].level, 2);
    }

    #[test]
    fn test_requirement_full_evidence_scenario_b() {
        let fx = testutil::Fixture::new();
        let req = fx.requirement("REQ-002", "Credit check on order entry");
        let item = fx.implementation_item("BKL-010", req.id);
        let test = fx.test_case_for_requirement("TC-100", req.id);
        fx.defect_on_test("DEF-900", test.id);
        let _ = item;

        let builder = ChainBuilder::new(&fx.store);
        let chain = builder
            .build_chain(EntityKind::Requirement, req.id)
            .unwrap()
            .unwrap();

        assert_eq!(chain.chain_depth, 4);
        assert_eq!(chain.links_summary.get("implementation_item"), Some(&1));
        assert_eq!(chain.links_summary.get("test_case"), Some(&1));
        assert_eq!(chain.links_summary.get("defect"), Some(&1));
        assert!(chain.gaps.is_empty());
    }

    #[test]
    fn test_depth_monotonic_as_evidence_is_added() {
        let fx = testutil::Fixture::new();
        let req = fx.requirement("REQ-003", "Dunning run");
        let builder = ChainBuilder::new(&fx.store);

        let d0 = builder
            .build_chain(EntityKind::Requirement, req.id)
            .unwrap()
            .unwrap()
            .chain_depth;

        fx.implementation_item("BKL-020", req.id);
        let d1 = builder
            .build_chain(EntityKind::Requirement, req.id)
            .unwrap()
            .unwrap()
            .chain_depth;

        let test = fx.test_case_for_requirement("TC-200", req.id);
        let d2 = builder
            .build_chain(EntityKind::Requirement, req.id)
            .unwrap()
            .unwrap()
            .chain_depth;

        fx.defect_on_test("DEF-901", test.id);
        let d3 = builder
            .build_chain(EntityKind::Requirement, req.id)
            .unwrap()
            .unwrap()
            .chain_depth;

        assert!(d0 <= d1 && d1 <= d2 && d2 <= d3);
        assert_eq!((d0, d1, d2, d3), (1, 2, 3, 4));
    }

    #[test]
    fn test_ancestor_cycle_terminates() {
        let fx = testutil::Fixture::new();
        // Corrupt fixture: L3 -> L2 -> L3 parent loop
        let mut l2 = ScopeNode::new(ScopeLevel::L2, "PG-01", "Process Group", fx.tenant, fx.project);
        let mut l3 = ScopeNode::new(ScopeLevel::L3, "SI-01", "Scope Item", fx.tenant, fx.project);
        l2.parent_id = Some(l3.id);
        l3.parent_id = Some(l2.id);
        fx.insert_node(l2.clone());
        fx.insert_node(l3.clone());

        let builder = ChainBuilder::new(&fx.store);
        let chain = builder
            .build_chain(EntityKind::ScopeNode, l3.id)
            .unwrap()
            .unwrap();

        // Finite and deduplicated: the loop contributes each node once.
        let scope_hops: Vec<_> = chain
            .upstream
            .iter()
            .filter(|h| h.kind == EntityKind::ScopeNode)
            .collect();
        assert_eq!(scope_hops.len(), 2);
    }

    #[test]
    fn test_links_summary_counts_by_tag() {
        let fx = testutil::Fixture::new();
        let req = fx.requirement("REQ-004", "Batch output");
        fx.implementation_item("BKL-030", req.id);
        fx.implementation_item("BKL-031", req.id);

        let builder = ChainBuilder::new(&fx.store);
        let chain = builder
            .build_chain(EntityKind::Requirement, req.id)
            .unwrap()
            .unwrap();
        assert_eq!(chain.links_summary.get("implementation_item"), Some(&2));
    }
}
