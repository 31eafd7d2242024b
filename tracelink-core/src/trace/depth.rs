//! Chain-depth scoring
//!
//! Depth is a monotonic function over the set of hop kinds present in a
//! merged chain: the maximum ordinal found in the axis table for the root
//! kind. The two tables are explicit data, not inferred from walk order.

use crate::registry::EntityKind;

/// Standard delivery axis: scenario, implementation item, spec pair,
/// test, defect.
pub const STANDARD_AXIS: &[(EntityKind, u32)] = &[
    (EntityKind::ScopeNode, 1),
    (EntityKind::Requirement, 1),
    (EntityKind::ImplementationItem, 2),
    (EntityKind::FunctionalSpec, 3),
    (EntityKind::TechnicalSpec, 4),
    (EntityKind::TestCase, 5),
    (EntityKind::Defect, 6),
];

/// Canonical requirement axis: workshop/process-hierarchy context,
/// implementation item, test, defect. Context kinds share the root
/// ordinal so upstream discovery alone never raises the depth.
pub const CANONICAL_AXIS: &[(EntityKind, u32)] = &[
    (EntityKind::Workshop, 1),
    (EntityKind::WorkshopSession, 1),
    (EntityKind::ScopeNode, 1),
    (EntityKind::Requirement, 1),
    (EntityKind::OpenItem, 1),
    (EntityKind::ImplementationItem, 2),
    (EntityKind::TestCase, 3),
    (EntityKind::Defect, 4),
];

/// Axis table used for a chain rooted at the given kind
pub fn axis_for(root: EntityKind) -> &'static [(EntityKind, u32)] {
    match root {
        EntityKind::Requirement
        | EntityKind::Workshop
        | EntityKind::WorkshopSession
        | EntityKind::OpenItem
        | EntityKind::OpenItemLink
        | EntityKind::Program => CANONICAL_AXIS,
        _ => STANDARD_AXIS,
    }
}

fn score(axis: &[(EntityKind, u32)], kind: EntityKind) -> Option<u32> {
    axis.iter().find(|(k, _)| *k == kind).map(|(_, s)| *s)
}

/// Maximum axis ordinal across the root and every hop, floor 1
pub fn chain_depth(root: EntityKind, hop_kinds: &[EntityKind]) -> u32 {
    let axis = axis_for(root);
    let mut depth = score(axis, root).unwrap_or(1);
    for kind in hop_kinds {
        if let Some(s) = score(axis, *kind) {
            depth = depth.max(s);
        }
    }
    depth
}
