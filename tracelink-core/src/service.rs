//! Operation surface consumed by the routing layer
//!
//! Contract only, no endpoint framing. Every entry point that accepts a
//! caller scope applies it to the very first store lookup; a scope
//! mismatch is reported as NotFound, indistinguishable from a missing
//! row, so existence cannot be probed across tenants. Children reached
//! through the verified root's own foreign keys are trusted.

use uuid::Uuid;

use crate::aggregate::FitAggregator;
use crate::coverage::{self, ProgramSummary};
use crate::error::{Result, TraceError};
use crate::lateral::{self, RequirementLinks};
use crate::models::{FitStatus, ScopeNode};
use crate::registry::EntityKind;
use crate::store::{self, Entity, EntityStore};
use crate::trace::{ChainBuilder, TraceChain};

/// Caller-supplied tenant/project scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub tenant_id: Uuid,
    pub project_id: Uuid,
}

/// The engine's exposed operations over one entity store
pub struct TraceService<'a> {
    store: &'a dyn EntityStore,
}

impl<'a> TraceService<'a> {
    pub fn new(store: &'a dyn EntityStore) -> Self {
        Self { store }
    }

    fn builder(&self) -> ChainBuilder<'a> {
        ChainBuilder::new(self.store)
    }

    /// Resolves and walks any entity by type tag and id
    pub fn build_chain(&self, kind_tag: &str, id: Uuid) -> Result<TraceChain> {
        let kind = EntityKind::parse(kind_tag)?;
        self.builder()
            .build_chain(kind, id)?
            .ok_or_else(|| TraceError::not_found(kind.tag(), id))
    }

    /// Lateral links (open items, decisions, notes) for a requirement
    pub fn get_requirement_links(&self, requirement_id: Uuid) -> Result<RequirementLinks> {
        let req = store::requirement(self.store, requirement_id)?
            .ok_or_else(|| TraceError::not_found("requirement", requirement_id))?;
        Ok(lateral::requirement_links(self.store, &req)?)
    }

    /// Canonical-axis coverage summary for a program
    pub fn get_program_summary(&self, program_id: Uuid) -> Result<ProgramSummary> {
        coverage::program_summary(self.store, program_id)?
            .ok_or_else(|| TraceError::not_found("program", program_id))
    }

    /// Canonical-axis trace for a requirement
    pub fn trace_requirement(&self, requirement_id: Uuid) -> Result<TraceChain> {
        self.builder()
            .build_chain(EntityKind::Requirement, requirement_id)?
            .ok_or_else(|| TraceError::not_found("requirement", requirement_id))
    }

    /// Trace for a configuration/backlog item, scope applied to the root
    pub fn trace_config_item(&self, item_id: Uuid, scope: Scope) -> Result<TraceChain> {
        let item = store::implementation_item(self.store, item_id)?
            .filter(|i| i.tenant_id == scope.tenant_id && i.project_id == scope.project_id)
            .ok_or_else(|| TraceError::not_found("implementation_item", item_id))?;
        self.builder().build_from(&Entity::ImplementationItem(item))
    }

    /// Upstream trace from a defect, scope applied to the root
    pub fn trace_upstream_from_defect(&self, defect_id: Uuid, scope: Scope) -> Result<TraceChain> {
        let defect = self
            .store
            .get(EntityKind::Defect, defect_id)?
            .and_then(|e| e.as_defect().cloned())
            .filter(|d| d.tenant_id == scope.tenant_id && d.project_id == scope.project_id)
            .ok_or_else(|| TraceError::not_found("defect", defect_id))?;
        self.builder().build_from(&Entity::Defect(defect))
    }

    /// All defect traces reachable under one process hierarchy node
    pub fn trace_defects_by_process(
        &self,
        scope: Scope,
        process_node_id: Uuid,
    ) -> Result<Vec<TraceChain>> {
        let node = store::scope_node(self.store, process_node_id)?
            .filter(|n| n.tenant_id == scope.tenant_id && n.project_id == scope.project_id)
            .ok_or_else(|| TraceError::not_found("scope_node", process_node_id))?;

        // The node plus its direct children cover both L3 and L4 entry points
        let mut node_ids: Vec<Uuid> = vec![node.id];
        for child in self.store.filter(EntityKind::ScopeNode, &|e| {
            e.as_scope_node().map_or(false, |n| n.parent_id == Some(node.id))
        })? {
            node_ids.push(child.id());
        }

        let req_ids: Vec<Uuid> = self
            .store
            .filter(EntityKind::Requirement, &|e| {
                e.as_requirement().map_or(false, |r| {
                    r.scope_node_id.map_or(false, |id| node_ids.contains(&id))
                        || r.process_step_id.map_or(false, |id| node_ids.contains(&id))
                })
            })?
            .iter()
            .map(|e| e.id())
            .collect();

        let item_ids: Vec<Uuid> = self
            .store
            .filter(EntityKind::ImplementationItem, &|e| {
                e.as_implementation_item()
                    .map_or(false, |i| req_ids.contains(&i.requirement_id))
            })?
            .iter()
            .map(|e| e.id())
            .collect();

        let test_ids: Vec<Uuid> = self
            .store
            .filter(EntityKind::TestCase, &|e| {
                e.as_test_case().map_or(false, |t| {
                    t.trace.requirement_id.map_or(false, |id| req_ids.contains(&id))
                        || t.trace
                            .implementation_item_id
                            .map_or(false, |id| item_ids.contains(&id))
                        || t.trace.scope_node_id.map_or(false, |id| node_ids.contains(&id))
                })
            })?
            .iter()
            .map(|e| e.id())
            .collect();

        let defects = self.store.filter(EntityKind::Defect, &|e| {
            e.as_defect().map_or(false, |d| {
                d.test_case_id.map_or(false, |id| test_ids.contains(&id))
                    || d.requirement_id.map_or(false, |id| req_ids.contains(&id))
            })
        })?;

        let builder = self.builder();
        let mut chains = Vec::new();
        for defect in defects {
            chains.push(builder.build_from(&defect)?);
        }
        Ok(chains)
    }

    /// Items without any test reference, batched anti-join
    pub fn items_without_tests(&self, scope: Scope) -> Result<Vec<crate::models::ImplementationItem>> {
        Ok(coverage::items_without_tests(
            self.store,
            scope.project_id,
            scope.tenant_id,
        )?)
    }

    /// Requirements without any test evidence
    pub fn requirements_without_tests(&self, scope: Scope) -> Result<Vec<crate::models::Requirement>> {
        Ok(coverage::requirements_without_tests(
            self.store,
            scope.project_id,
            scope.tenant_id,
        )?)
    }

    /// Aggregation pass-throughs, kept on the service so the routing layer
    /// has one surface to bind.

    pub fn suggest_fit(&self, node_id: Uuid) -> Result<Option<FitStatus>> {
        FitAggregator::new(self.store).suggest(node_id)
    }

    pub fn recalc_consolidated(&self, node_id: Uuid) -> Result<ScopeNode> {
        FitAggregator::new(self.store).recalc_consolidated(node_id)
    }

    pub fn propagate_from_leaf(
        &self,
        leaf_id: Uuid,
        decision: FitStatus,
        is_final_session: bool,
    ) -> Result<ScopeNode> {
        FitAggregator::new(self.store).propagate_from_leaf(leaf_id, decision, is_final_session)
    }

    pub fn override_decision(
        &self,
        node_id: Uuid,
        actor: &str,
        new_status: FitStatus,
        rationale: &str,
    ) -> Result<ScopeNode> {
        FitAggregator::new(self.store).override_decision(node_id, actor, new_status, rationale)
    }

    pub fn sign_off(
        &self,
        node_id: Uuid,
        actor: &str,
        decision: FitStatus,
        rationale: Option<&str>,
        force: bool,
    ) -> Result<crate::aggregate::SignOffOutcome> {
        FitAggregator::new(self.store).sign_off(node_id, actor, decision, rationale, force)
    }

    pub fn readiness(&self, node_id: Uuid) -> Result<f64> {
        FitAggregator::new(self.store).readiness(node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use crate::testutil;

    #[test]
    fn test_build_chain_rejects_unknown_tag() {
        let fx = testutil::Fixture::new();
        let service = TraceService::new(&fx.store);
        let err = service.build_chain("mystery", Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, TraceError::InvalidEntityType { .. }));
    }

    #[test]
    fn test_build_chain_missing_root_is_not_found() {
        let fx = testutil::Fixture::new();
        let service = TraceService::new(&fx.store);
        let err = service
            .build_chain("requirement", Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(err, TraceError::NotFound { .. }));
    }

    #[test]
    fn test_trace_config_item_enforces_scope() {
        let fx = testutil::Fixture::new();
        let req = fx.requirement("REQ-500", "Scoped");
        let item = fx.implementation_item("BKL-200", req.id);

        let service = TraceService::new(&fx.store);
        let own = Scope {
            tenant_id: fx.tenant,
            project_id: fx.project,
        };
        assert!(service.trace_config_item(item.id, own).is_ok());

        // Wrong project: indistinguishable from a missing row
        let foreign = Scope {
            tenant_id: fx.tenant,
            project_id: Uuid::new_v4(),
        };
        let err = service.trace_config_item(item.id, foreign).unwrap_err();
        assert!(matches!(err, TraceError::NotFound { .. }));
    }

    #[test]
    fn test_trace_upstream_from_defect_scope_and_walk() {
        let fx = testutil::Fixture::new();
        let req = fx.requirement("REQ-501", "Defective");
        let test = fx.test_case_for_requirement("TC-700", req.id);
        let defect = fx.defect_on_test("DEF-930", test.id);

        let service = TraceService::new(&fx.store);
        let scope = Scope {
            tenant_id: fx.tenant,
            project_id: fx.project,
        };
        let chain = service.trace_upstream_from_defect(defect.id, scope).unwrap();
        assert!(chain
            .upstream
            .iter()
            .any(|h| h.kind == EntityKind::TestCase));
        assert!(chain
            .upstream
            .iter()
            .any(|h| h.kind == EntityKind::Requirement));

        let foreign = Scope {
            tenant_id: Uuid::new_v4(),
            project_id: fx.project,
        };
        assert!(matches!(
            service.trace_upstream_from_defect(defect.id, foreign),
            Err(TraceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_trace_defects_by_process_collects_via_steps() {
        let fx = testutil::Fixture::new();
        let l3 = fx.node(ScopeLevel::L3, "SI-200", None);
        let step = fx.node(ScopeLevel::L4, "ST-200", Some(l3.id));

        let mut req = fx.requirement("REQ-502", "Step requirement");
        req.process_step_id = Some(step.id);
        fx.store.insert(Entity::Requirement(req.clone())).unwrap();

        let test = fx.test_case_for_requirement("TC-701", req.id);
        let defect = fx.defect_on_test("DEF-931", test.id);

        let service = TraceService::new(&fx.store);
        let scope = Scope {
            tenant_id: fx.tenant,
            project_id: fx.project,
        };
        let chains = service.trace_defects_by_process(scope, l3.id).unwrap();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].entity.id, defect.id);
    }

    #[test]
    fn test_get_requirement_links_not_found() {
        let fx = testutil::Fixture::new();
        let service = TraceService::new(&fx.store);
        assert!(matches!(
            service.get_requirement_links(Uuid::new_v4()),
            Err(TraceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_get_program_summary_not_found() {
        let fx = testutil::Fixture::new();
        let service = TraceService::new(&fx.store);
        assert!(matches!(
            service.get_program_summary(Uuid::new_v4()),
            Err(TraceError::NotFound { .. })
        ));
    }
}
