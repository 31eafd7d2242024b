//! Coverage and gap reporting
//!
//! Store-wide advisory views. The anti-joins here are single batched
//! passes: one scan collects the referenced ids, a second scan filters
//! against the set. No per-item existence checks.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

use crate::models::{ImplementationItem, Requirement};
use crate::registry::EntityKind;
use crate::store::EntityStore;

/// Count plus percentage of a base population
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct CoverageStat {
    pub count: usize,
    pub pct: f64,
}

impl CoverageStat {
    fn of(count: usize, total: usize) -> Self {
        let pct = if total == 0 {
            0.0
        } else {
            ((100.0 * count as f64 / total as f64) * 100.0).round() / 100.0
        };
        Self { count, pct }
    }
}

/// Canonical-axis coverage for one program
#[derive(Debug, Clone, Serialize)]
pub struct ProgramSummary {
    pub program_id: Uuid,
    pub program_name: String,
    pub requirement_count: usize,
    pub with_implementation: CoverageStat,
    pub with_tests: CoverageStat,
    pub with_defects: CoverageStat,
    pub implementation_item_count: usize,
    pub test_case_count: usize,
    pub open_defect_count: usize,
}

/// Implementation items in scope that no test case references.
///
/// Computed as a set difference: one batched scan over test cases builds
/// the referenced-id set, one scan over items filters against it.
pub fn items_without_tests(
    store: &dyn EntityStore,
    project_id: Uuid,
    tenant_id: Uuid,
) -> Result<Vec<ImplementationItem>> {
    let tested: HashSet<Uuid> = store
        .filter(EntityKind::TestCase, &|e| {
            e.as_test_case().map_or(false, |t| {
                t.project_id == project_id && t.tenant_id == tenant_id
            })
        })?
        .iter()
        .filter_map(|e| e.as_test_case().and_then(|t| t.trace.implementation_item_id))
        .collect();

    Ok(store
        .filter(EntityKind::ImplementationItem, &|e| {
            e.as_implementation_item().map_or(false, |i| {
                i.project_id == project_id && i.tenant_id == tenant_id
            })
        })?
        .into_iter()
        .filter_map(|e| e.as_implementation_item().cloned())
        .filter(|i| !tested.contains(&i.id))
        .collect())
}

/// Requirements in scope with no test evidence, direct or via their
/// implementation items. Same batched anti-join contract.
pub fn requirements_without_tests(
    store: &dyn EntityStore,
    project_id: Uuid,
    tenant_id: Uuid,
) -> Result<Vec<Requirement>> {
    let items: Vec<(Uuid, Uuid)> = store
        .filter(EntityKind::ImplementationItem, &|e| {
            e.as_implementation_item().map_or(false, |i| {
                i.project_id == project_id && i.tenant_id == tenant_id
            })
        })?
        .iter()
        .filter_map(|e| e.as_implementation_item().map(|i| (i.id, i.requirement_id)))
        .collect();

    let mut covered: HashSet<Uuid> = HashSet::new();
    for entity in store.filter(EntityKind::TestCase, &|e| {
        e.as_test_case().map_or(false, |t| {
            t.project_id == project_id && t.tenant_id == tenant_id
        })
    })? {
        let test = match entity.as_test_case() {
            Some(test) => test,
            None => continue,
        };
        if let Some(req_id) = test.trace.requirement_id {
            covered.insert(req_id);
        }
        if let Some(item_id) = test.trace.implementation_item_id {
            // Map item-level evidence back to its requirement
            if let Some((_, req_id)) = items.iter().find(|(id, _)| *id == item_id) {
                covered.insert(*req_id);
            }
        }
    }

    Ok(store
        .filter(EntityKind::Requirement, &|e| {
            e.as_requirement().map_or(false, |r| {
                r.project_id == project_id && r.tenant_id == tenant_id
            })
        })?
        .into_iter()
        .filter_map(|e| e.as_requirement().cloned())
        .filter(|r| !covered.contains(&r.id))
        .collect())
}

/// Counts and percentage coverage at each canonical-axis hop, scoped to
/// one program's tenant and project.
pub fn program_summary(store: &dyn EntityStore, program_id: Uuid) -> Result<Option<ProgramSummary>> {
    let program = match store.get(EntityKind::Program, program_id)? {
        Some(entity) => match entity.as_program() {
            Some(program) => program.clone(),
            None => return Ok(None),
        },
        None => return Ok(None),
    };
    let (tenant_id, project_id) = (program.tenant_id, program.project_id);

    let requirements: Vec<Requirement> = store
        .filter(EntityKind::Requirement, &|e| {
            e.as_requirement().map_or(false, |r| {
                r.tenant_id == tenant_id && r.project_id == project_id
            })
        })?
        .into_iter()
        .filter_map(|e| e.as_requirement().cloned())
        .collect();
    let total = requirements.len();

    let items: Vec<(Uuid, Uuid)> = store
        .filter(EntityKind::ImplementationItem, &|e| {
            e.as_implementation_item().map_or(false, |i| {
                i.tenant_id == tenant_id && i.project_id == project_id
            })
        })?
        .iter()
        .filter_map(|e| e.as_implementation_item().map(|i| (i.id, i.requirement_id)))
        .collect();
    let implemented: HashSet<Uuid> = items.iter().map(|(_, req)| *req).collect();

    let tests = store.filter(EntityKind::TestCase, &|e| {
        e.as_test_case().map_or(false, |t| {
            t.tenant_id == tenant_id && t.project_id == project_id
        })
    })?;
    let mut tested: HashSet<Uuid> = HashSet::new();
    let mut test_ids: HashSet<Uuid> = HashSet::new();
    for entity in &tests {
        if let Some(test) = entity.as_test_case() {
            test_ids.insert(test.id);
            if let Some(req_id) = test.trace.requirement_id {
                tested.insert(req_id);
            }
            if let Some(item_id) = test.trace.implementation_item_id {
                if let Some((_, req_id)) = items.iter().find(|(id, _)| *id == item_id) {
                    tested.insert(*req_id);
                }
            }
        }
    }

    let defects = store.filter(EntityKind::Defect, &|e| {
        e.as_defect().map_or(false, |d| {
            d.tenant_id == tenant_id && d.project_id == project_id
        })
    })?;
    let mut defective: HashSet<Uuid> = HashSet::new();
    let mut open_defects = 0;
    for entity in &defects {
        if let Some(defect) = entity.as_defect() {
            if matches!(
                defect.status,
                crate::models::DefectStatus::Open | crate::models::DefectStatus::InProgress
            ) {
                open_defects += 1;
            }
            if let Some(req_id) = defect.requirement_id {
                defective.insert(req_id);
            }
            if let Some(test_id) = defect.test_case_id {
                if test_ids.contains(&test_id) {
                    // Attribute via the test's own requirement link
                    if let Some(test) = tests
                        .iter()
                        .filter_map(|e| e.as_test_case())
                        .find(|t| t.id == test_id)
                    {
                        if let Some(req_id) = test.trace.requirement_id {
                            defective.insert(req_id);
                        }
                        if let Some(item_id) = test.trace.implementation_item_id {
                            if let Some((_, req_id)) = items.iter().find(|(id, _)| *id == item_id) {
                                defective.insert(*req_id);
                            }
                        }
                    }
                }
            }
        }
    }

    let count_in = |set: &HashSet<Uuid>| requirements.iter().filter(|r| set.contains(&r.id)).count();

    Ok(Some(ProgramSummary {
        program_id: program.id,
        program_name: program.name.clone(),
        requirement_count: total,
        with_implementation: CoverageStat::of(count_in(&implemented), total),
        with_tests: CoverageStat::of(count_in(&tested), total),
        with_defects: CoverageStat::of(count_in(&defective), total),
        implementation_item_count: items.len(),
        test_case_count: tests.len(),
        open_defect_count: open_defects,
    }))
}
