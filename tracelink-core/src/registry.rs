//! Entity type registry
//!
//! Every supported entity type is a closed enum variant bundling exactly
//! one upstream and one downstream walk procedure. The exhaustive match in
//! `handlers` means a newly added kind will not compile until both walkers
//! are wired.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TraceError;
use crate::store::{Entity, EntityStore};
use crate::trace::walkers;
use crate::trace::Hop;

/// Walker procedure: produces the ordered hops on one side of the chain.
/// Walkers never fail on a missing intermediate row; store errors are the
/// only error path out.
pub type WalkFn = fn(&dyn EntityStore, &Entity) -> anyhow::Result<Vec<Hop>>;

/// The walker pair for one entity kind
#[derive(Clone, Copy)]
pub struct TypeHandlers {
    pub upstream: WalkFn,
    pub downstream: WalkFn,
}

/// Closed set of entity type tags the engine understands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    ScopeNode,
    Requirement,
    ImplementationItem,
    FunctionalSpec,
    TechnicalSpec,
    TestCase,
    Defect,
    OpenItem,
    OpenItemLink,
    Workshop,
    WorkshopSession,
    DecisionRecord,
    CommentNote,
    Program,
}

impl EntityKind {
    /// Every supported kind, in axis order
    pub const ALL: &'static [EntityKind] = &[
        EntityKind::ScopeNode,
        EntityKind::Requirement,
        EntityKind::ImplementationItem,
        EntityKind::FunctionalSpec,
        EntityKind::TechnicalSpec,
        EntityKind::TestCase,
        EntityKind::Defect,
        EntityKind::OpenItem,
        EntityKind::OpenItemLink,
        EntityKind::Workshop,
        EntityKind::WorkshopSession,
        EntityKind::DecisionRecord,
        EntityKind::CommentNote,
        EntityKind::Program,
    ];

    /// The stable string tag used in store rows and chain output
    pub fn tag(&self) -> &'static str {
        match self {
            EntityKind::ScopeNode => "scope_node",
            EntityKind::Requirement => "requirement",
            EntityKind::ImplementationItem => "implementation_item",
            EntityKind::FunctionalSpec => "functional_spec",
            EntityKind::TechnicalSpec => "technical_spec",
            EntityKind::TestCase => "test_case",
            EntityKind::Defect => "defect",
            EntityKind::OpenItem => "open_item",
            EntityKind::OpenItemLink => "open_item_link",
            EntityKind::Workshop => "workshop",
            EntityKind::WorkshopSession => "workshop_session",
            EntityKind::DecisionRecord => "decision_record",
            EntityKind::CommentNote => "comment_note",
            EntityKind::Program => "program",
        }
    }

    /// Parse a caller-supplied type tag. Unknown tags produce
    /// `InvalidEntityType` listing the valid set.
    pub fn parse(tag: &str) -> Result<Self, TraceError> {
        let normalized = tag.trim().to_lowercase().replace('-', "_");
        EntityKind::ALL
            .iter()
            .copied()
            .find(|k| k.tag() == normalized)
            .ok_or_else(|| TraceError::InvalidEntityType {
                given: tag.to_string(),
                valid: EntityKind::ALL
                    .iter()
                    .map(|k| k.tag())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// The walker pair for this kind
    pub fn handlers(&self) -> TypeHandlers {
        match self {
            EntityKind::ScopeNode => TypeHandlers {
                upstream: walkers::scope_node_upstream,
                downstream: walkers::scope_node_downstream,
            },
            EntityKind::Requirement => TypeHandlers {
                upstream: walkers::requirement_upstream,
                downstream: walkers::requirement_downstream,
            },
            EntityKind::ImplementationItem => TypeHandlers {
                upstream: walkers::implementation_item_upstream,
                downstream: walkers::implementation_item_downstream,
            },
            EntityKind::FunctionalSpec => TypeHandlers {
                upstream: walkers::functional_spec_upstream,
                downstream: walkers::functional_spec_downstream,
            },
            EntityKind::TechnicalSpec => TypeHandlers {
                upstream: walkers::technical_spec_upstream,
                downstream: walkers::no_hops,
            },
            EntityKind::TestCase => TypeHandlers {
                upstream: walkers::test_case_upstream,
                downstream: walkers::test_case_downstream,
            },
            EntityKind::Defect => TypeHandlers {
                upstream: walkers::defect_upstream,
                downstream: walkers::no_hops,
            },
            EntityKind::OpenItem => TypeHandlers {
                upstream: walkers::open_item_upstream,
                downstream: walkers::no_hops,
            },
            EntityKind::OpenItemLink => TypeHandlers {
                upstream: walkers::open_item_link_upstream,
                downstream: walkers::no_hops,
            },
            EntityKind::Workshop => TypeHandlers {
                upstream: walkers::workshop_upstream,
                downstream: walkers::workshop_downstream,
            },
            EntityKind::WorkshopSession => TypeHandlers {
                upstream: walkers::workshop_session_upstream,
                downstream: walkers::no_hops,
            },
            EntityKind::DecisionRecord => TypeHandlers {
                upstream: walkers::decision_record_upstream,
                downstream: walkers::no_hops,
            },
            EntityKind::CommentNote => TypeHandlers {
                upstream: walkers::comment_note_upstream,
                downstream: walkers::no_hops,
            },
            EntityKind::Program => TypeHandlers {
                upstream: walkers::no_hops,
                downstream: walkers::program_downstream,
            },
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}
