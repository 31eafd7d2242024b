//! Fit/gap aggregation over the scope hierarchy
//!
//! Suggested and consolidated status roll up from L4 leaves; manual
//! overrides pin the consolidated value, and an L3 sign-off is gated on
//! preconditions. Every node write goes through the store's atomic
//! per-node update so a recalculation racing an override cannot lose
//! either write.

use uuid::Uuid;

use crate::error::{Result, TraceError, ValidationReason};
use crate::models::{ConfirmationStatus, FitStatus, Priority, ScopeLevel, ScopeNode};
use crate::registry::EntityKind;
use crate::store::{self, EntityStore};

/// Result of a successful sign-off
#[derive(Debug, Clone)]
pub struct SignOffOutcome {
    pub node: ScopeNode,
    /// True when the signed decision disagreed with the system suggestion
    pub overrode_suggestion: bool,
}

/// Computes and persists fit/gap aggregates
pub struct FitAggregator<'a> {
    store: &'a dyn EntityStore,
}

impl<'a> FitAggregator<'a> {
    pub fn new(store: &'a dyn EntityStore) -> Self {
        Self { store }
    }

    fn node(&self, id: Uuid) -> Result<ScopeNode> {
        store::scope_node(self.store, id)?.ok_or_else(|| TraceError::not_found("scope_node", id))
    }

    /// Direct in-scope children of a node
    fn in_scope_children(&self, node_id: Uuid) -> Result<Vec<ScopeNode>> {
        let children = self.store.filter(EntityKind::ScopeNode, &|e| {
            e.as_scope_node()
                .map_or(false, |n| n.parent_id == Some(node_id) && n.is_in_scope())
        })?;
        Ok(children
            .into_iter()
            .filter_map(|e| e.as_scope_node().cloned())
            .collect())
    }

    /// The status a child contributes to its parent's aggregate: the direct
    /// assessment for L4 leaves, the consolidated decision above that.
    fn child_assessment(child: &ScopeNode) -> Option<FitStatus> {
        if child.level.is_leaf() {
            child.fit_status
        } else {
            child.consolidated_fit_decision
        }
    }

    /// Aggregation truth table over direct in-scope children:
    /// no children or none assessed -> None; all assessed and identical ->
    /// that status; anything mixed or partially assessed -> PartialFit.
    pub fn suggested_fit(children: &[ScopeNode]) -> Option<FitStatus> {
        if children.is_empty() {
            return None;
        }
        let assessed: Vec<FitStatus> =
            children.iter().filter_map(Self::child_assessment).collect();
        if assessed.is_empty() {
            return None;
        }
        if assessed.len() < children.len() {
            return Some(FitStatus::PartialFit);
        }
        let first = assessed[0];
        if assessed.iter().all(|s| *s == first) {
            Some(first)
        } else {
            Some(FitStatus::PartialFit)
        }
    }

    /// Read-only view of the suggestion a recalculation would produce
    pub fn suggest(&self, node_id: Uuid) -> Result<Option<FitStatus>> {
        self.node(node_id)?;
        Ok(Self::suggested_fit(&self.in_scope_children(node_id)?))
    }

    /// Recomputes the suggestion and, unless an override is active, mirrors
    /// it into the consolidated decision. Idempotent for unchanged data.
    pub fn recalc_consolidated(&self, node_id: Uuid) -> Result<ScopeNode> {
        let children = self.in_scope_children(node_id)?;
        let suggestion = Self::suggested_fit(&children);

        self.store
            .update_scope_node(node_id, &|node| {
                node.system_suggested_fit = suggestion;
                if !node.override_active {
                    node.consolidated_fit_decision = suggestion;
                }
            })?
            .ok_or_else(|| TraceError::not_found("scope_node", node_id))
    }

    /// Writes a workshop leaf decision onto an L4 node and, for the final
    /// session only, rolls up exactly one level of consolidation and one
    /// level of readiness. Interim assessments never perturb ancestors.
    pub fn propagate_from_leaf(
        &self,
        leaf_id: Uuid,
        decision: FitStatus,
        is_final_session: bool,
    ) -> Result<ScopeNode> {
        let leaf = self.node(leaf_id)?;
        if !leaf.level.is_leaf() {
            return Err(TraceError::ValidationFailed(ValidationReason::WrongLevel {
                expected: ScopeLevel::L4.to_string(),
                actual: leaf.level.to_string(),
            }));
        }

        let updated = self
            .store
            .update_scope_node(leaf_id, &|node| {
                node.fit_status = Some(decision);
            })?
            .ok_or_else(|| TraceError::not_found("scope_node", leaf_id))?;

        if !is_final_session {
            return Ok(updated);
        }

        if let Some(parent_id) = updated.parent_id {
            // One level: consolidate the L3 parent
            let parent = self.recalc_consolidated(parent_id)?;
            if let Some(grandparent_id) = parent.parent_id {
                // One more: readiness on the L2 grandparent
                self.readiness(grandparent_id)?;
            }
        }

        Ok(updated)
    }

    /// Pins the consolidated decision with a mandatory rationale
    pub fn override_decision(
        &self,
        node_id: Uuid,
        actor: &str,
        new_status: FitStatus,
        rationale: &str,
    ) -> Result<ScopeNode> {
        if rationale.trim().is_empty() {
            return Err(TraceError::ValidationFailed(
                ValidationReason::RationaleRequired,
            ));
        }
        let actor = actor.to_string();
        let rationale = rationale.trim().to_string();
        let now = chrono::Utc::now();

        self.store
            .update_scope_node(node_id, &|node| {
                node.override_active = true;
                node.override_rationale = Some(rationale.clone());
                node.override_by = Some(actor.clone());
                node.override_at = Some(now);
                node.consolidated_fit_decision = Some(new_status);
            })?
            .ok_or_else(|| TraceError::not_found("scope_node", node_id))
    }

    /// Sign-off blockers for an L3 node; empty means the gate is open
    pub fn sign_off_blockers(&self, node: &ScopeNode) -> Result<Vec<String>> {
        let children = self.in_scope_children(node.id)?;
        let mut blockers = Vec::new();

        let unassessed = children
            .iter()
            .filter(|c| Self::child_assessment(c).is_none())
            .count();
        if unassessed > 0 {
            blockers.push(format!(
                "{} unassessed L4 process step{}",
                unassessed,
                if unassessed == 1 { "" } else { "s" }
            ));
        }

        // Requirements scoped to this L3 directly or via its L4 children
        let mut scope_ids: Vec<Uuid> = children.iter().map(|c| c.id).collect();
        scope_ids.push(node.id);
        let scoped_requirements: Vec<_> = self
            .store
            .filter(EntityKind::Requirement, &|e| {
                e.as_requirement().map_or(false, |r| {
                    r.scope_node_id.map_or(false, |id| scope_ids.contains(&id))
                        || r.process_step_id.map_or(false, |id| scope_ids.contains(&id))
                })
            })?
            .into_iter()
            .filter_map(|e| e.as_requirement().cloned())
            .collect();

        let unsettled = scoped_requirements
            .iter()
            .filter(|r| r.status.blocks_sign_off())
            .count();
        if unsettled > 0 {
            blockers.push(format!(
                "{} requirement{} still in draft or under review",
                unsettled,
                if unsettled == 1 { "" } else { "s" }
            ));
        }

        // Open P1 items reachable through the scoped requirements
        let req_ids: Vec<Uuid> = scoped_requirements.iter().map(|r| r.id).collect();
        let linked_item_ids: Vec<Uuid> = self
            .store
            .filter(EntityKind::OpenItemLink, &|e| {
                e.as_open_item_link()
                    .map_or(false, |l| req_ids.contains(&l.requirement_id))
            })?
            .into_iter()
            .filter_map(|e| e.as_open_item_link().map(|l| l.open_item_id))
            .collect();
        let open_p1 = self
            .store
            .filter(EntityKind::OpenItem, &|e| {
                e.as_open_item().map_or(false, |i| {
                    linked_item_ids.contains(&i.id)
                        && i.priority == Priority::P1
                        && i.status.is_open()
                })
            })?
            .len();
        if open_p1 > 0 {
            blockers.push(format!(
                "{} open P1 item{}",
                open_p1,
                if open_p1 == 1 { "" } else { "s" }
            ));
        }

        Ok(blockers)
    }

    /// Formally fixes an L3 node's consolidated decision.
    ///
    /// All preconditions must hold unless `force` is supplied. A decision
    /// that disagrees with the system suggestion becomes an override and
    /// requires a rationale. Triggers one readiness recompute above.
    pub fn sign_off(
        &self,
        node_id: Uuid,
        actor: &str,
        decision: FitStatus,
        rationale: Option<&str>,
        force: bool,
    ) -> Result<SignOffOutcome> {
        let node = self.node(node_id)?;
        if node.level != ScopeLevel::L3 {
            return Err(TraceError::ValidationFailed(ValidationReason::WrongLevel {
                expected: ScopeLevel::L3.to_string(),
                actual: node.level.to_string(),
            }));
        }

        if !force {
            let blockers = self.sign_off_blockers(&node)?;
            if !blockers.is_empty() {
                return Err(TraceError::ValidationFailed(
                    ValidationReason::SignOffBlocked { blockers },
                ));
            }
        }

        let children = self.in_scope_children(node_id)?;
        let suggestion = Self::suggested_fit(&children);
        let disagrees = suggestion != Some(decision);
        if disagrees && rationale.map_or(true, |r| r.trim().is_empty()) {
            return Err(TraceError::ValidationFailed(
                ValidationReason::RationaleRequired,
            ));
        }

        let actor = actor.to_string();
        let rationale = rationale.map(|r| r.trim().to_string());
        let now = chrono::Utc::now();
        let updated = self
            .store
            .update_scope_node(node_id, &|n| {
                n.system_suggested_fit = suggestion;
                n.consolidated_fit_decision = Some(decision);
                if disagrees {
                    n.override_active = true;
                    n.override_rationale = rationale.clone();
                    n.override_by = Some(actor.clone());
                    n.override_at = Some(now);
                }
            })?
            .ok_or_else(|| TraceError::not_found("scope_node", node_id))?;

        if let Some(parent_id) = updated.parent_id {
            self.readiness(parent_id)?;
        }

        Ok(SignOffOutcome {
            node: updated,
            overrode_suggestion: disagrees,
        })
    }

    /// Percent of direct in-scope children with a decided status, rounded
    /// to two decimals; zero children scores 0. Auto-sets the confirmation
    /// status unless a human already confirmed it.
    pub fn readiness(&self, node_id: Uuid) -> Result<f64> {
        let children = self.in_scope_children(node_id)?;
        let pct = if children.is_empty() {
            0.0
        } else {
            let decided = children
                .iter()
                .filter(|c| Self::child_assessment(c).is_some())
                .count();
            round2(100.0 * decided as f64 / children.len() as f64)
        };

        let complete = !children.is_empty() && pct >= 100.0;
        self.store
            .update_scope_node(node_id, &|node| {
                node.readiness_pct = Some(pct);
                if node.confirmation_status != ConfirmationStatus::Confirmed {
                    node.confirmation_status = if complete {
                        ConfirmationStatus::Ready
                    } else {
                        ConfirmationStatus::NotReady
                    };
                }
            })?
            .ok_or_else(|| TraceError::not_found("scope_node", node_id))?;

        Ok(pct)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
