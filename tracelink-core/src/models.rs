use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Level of a node in the 4-level scope hierarchy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScopeLevel {
    /// Business area
    L1,
    /// Process group
    L2,
    /// End-to-end scope item
    L3,
    /// Process step (leaf)
    L4,
}

impl ScopeLevel {
    /// Numeric level (1-4)
    pub fn depth(&self) -> u8 {
        match self {
            ScopeLevel::L1 => 1,
            ScopeLevel::L2 => 2,
            ScopeLevel::L3 => 3,
            ScopeLevel::L4 => 4,
        }
    }

    /// True for L4 process steps, the only level where fit is assessed directly
    pub fn is_leaf(&self) -> bool {
        matches!(self, ScopeLevel::L4)
    }
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.depth())
    }
}

/// Whether a hierarchy node participates in the current delivery scope
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScopeStatus {
    InScope,
    OutOfScope,
    Deferred,
}

impl fmt::Display for ScopeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeStatus::InScope => write!(f, "In Scope"),
            ScopeStatus::OutOfScope => write!(f, "Out of Scope"),
            ScopeStatus::Deferred => write!(f, "Deferred"),
        }
    }
}

/// Fit/gap verdict for a process step or an aggregate of steps
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FitStatus {
    /// Standard capability satisfies the need
    Fit,
    /// Custom work is required
    Gap,
    /// Mixed or partially assessed aggregate
    PartialFit,
}

impl fmt::Display for FitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitStatus::Fit => write!(f, "fit"),
            FitStatus::Gap => write!(f, "gap"),
            FitStatus::PartialFit => write!(f, "partial_fit"),
        }
    }
}

impl FitStatus {
    /// Parse a fit status from a string tag
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fit" => Some(FitStatus::Fit),
            "gap" => Some(FitStatus::Gap),
            "partial_fit" | "partial-fit" | "partial" => Some(FitStatus::PartialFit),
            _ => None,
        }
    }
}

/// Readiness confirmation state for a hierarchy node
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Ready,
    NotReady,
    /// Confirmed by a human; never silently downgraded by recomputation
    Confirmed,
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmationStatus::Ready => write!(f, "ready"),
            ConfirmationStatus::NotReady => write!(f, "not_ready"),
            ConfirmationStatus::Confirmed => write!(f, "confirmed"),
        }
    }
}

/// A node in the business-process scope hierarchy (L1 area down to L4 step)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeNode {
    /// Unique identifier
    pub id: Uuid,

    /// Hierarchy level
    pub level: ScopeLevel,

    /// Parent node; None only for L1 roots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,

    /// Human-friendly code (e.g. "O2C-030")
    pub code: String,

    /// Display name
    pub name: String,

    /// Scope participation
    pub scope_status: ScopeStatus,

    /// Direct assessment; only ever set on L4 leaves
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit_status: Option<FitStatus>,

    /// Aggregated suggestion derived from children
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_suggested_fit: Option<FitStatus>,

    /// Consolidated decision; mirrors the suggestion unless overridden
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consolidated_fit_decision: Option<FitStatus>,

    /// True while a manual override pins the consolidated decision
    #[serde(default)]
    pub override_active: bool,

    /// Mandatory rationale recorded with an override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_rationale: Option<String>,

    /// Who overrode the decision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_by: Option<String>,

    /// When the override was recorded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_at: Option<DateTime<Utc>>,

    /// Percent of direct in-scope children with a consolidated decision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness_pct: Option<f64>,

    /// Readiness confirmation state
    pub confirmation_status: ConfirmationStatus,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Owning project
    pub project_id: Uuid,

    /// Optimistic-concurrency version; bumped on every node update
    #[serde(default)]
    pub version: u64,
}

impl ScopeNode {
    /// Creates a new in-scope node with empty assessment state
    pub fn new(level: ScopeLevel, code: &str, name: &str, tenant_id: Uuid, project_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            parent_id: None,
            code: code.to_string(),
            name: name.to_string(),
            scope_status: ScopeStatus::InScope,
            fit_status: None,
            system_suggested_fit: None,
            consolidated_fit_decision: None,
            override_active: false,
            override_rationale: None,
            override_by: None,
            override_at: None,
            readiness_pct: None,
            confirmation_status: ConfirmationStatus::NotReady,
            tenant_id,
            project_id,
            version: 0,
        }
    }

    /// True when this node counts toward aggregation
    pub fn is_in_scope(&self) -> bool {
        self.scope_status == ScopeStatus::InScope
    }
}

/// Lifecycle status of a requirement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RequirementStatus {
    Draft,
    UnderReview,
    Approved,
    Dropped,
}

impl fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementStatus::Draft => write!(f, "Draft"),
            RequirementStatus::UnderReview => write!(f, "Under Review"),
            RequirementStatus::Approved => write!(f, "Approved"),
            RequirementStatus::Dropped => write!(f, "Dropped"),
        }
    }
}

impl RequirementStatus {
    /// True for the states that block an L3 sign-off
    pub fn blocks_sign_off(&self) -> bool {
        matches!(self, RequirementStatus::Draft | RequirementStatus::UnderReview)
    }
}

/// Priority, P1 highest
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    P1,
    P2,
    P3,
    P4,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::P1 => write!(f, "P1"),
            Priority::P2 => write!(f, "P2"),
            Priority::P3 => write!(f, "P3"),
            Priority::P4 => write!(f, "P4"),
        }
    }
}

/// Category of a requirement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RequirementType {
    Functional,
    NonFunctional,
    Integration,
    Reporting,
}

impl fmt::Display for RequirementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementType::Functional => write!(f, "Functional"),
            RequirementType::NonFunctional => write!(f, "Non-Functional"),
            RequirementType::Integration => write!(f, "Integration"),
            RequirementType::Reporting => write!(f, "Reporting"),
        }
    }
}

/// A captured business requirement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    pub id: Uuid,

    /// Human-friendly code (e.g. "REQ-0042")
    pub code: String,

    pub title: String,

    pub status: RequirementStatus,

    pub priority: Priority,

    pub req_type: RequirementType,

    /// Workshop the requirement was raised in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workshop_id: Option<Uuid>,

    /// L4 process step the requirement is attached to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_step_id: Option<Uuid>,

    /// Scope node the requirement is assessed against (usually an L3)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_node_id: Option<Uuid>,

    pub tenant_id: Uuid,

    pub project_id: Uuid,

    pub created_at: DateTime<Utc>,
}

impl Requirement {
    /// Creates an approved functional requirement with no links
    pub fn new(code: &str, title: &str, tenant_id: Uuid, project_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.to_string(),
            title: title.to_string(),
            status: RequirementStatus::Approved,
            priority: Priority::P3,
            req_type: RequirementType::Functional,
            workshop_id: None,
            process_step_id: None,
            scope_node_id: None,
            tenant_id,
            project_id,
            created_at: Utc::now(),
        }
    }
}

/// Kind of implementation backlog entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ItemKind {
    /// Development backlog item
    Backlog,
    /// Configuration item
    Config,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Backlog => write!(f, "Backlog"),
            ItemKind::Config => write!(f, "Config"),
        }
    }
}

/// Delivery status of an implementation item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ItemStatus {
    Open,
    InProgress,
    Done,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemStatus::Open => write!(f, "Open"),
            ItemStatus::InProgress => write!(f, "In Progress"),
            ItemStatus::Done => write!(f, "Done"),
        }
    }
}

/// Backlog or configuration item implementing a requirement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplementationItem {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub item_kind: ItemKind,
    pub status: ItemStatus,
    /// The requirement this item implements
    pub requirement_id: Uuid,
    pub tenant_id: Uuid,
    pub project_id: Uuid,
}

/// Functional specification, 1:1 from an implementation item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionalSpec {
    pub id: Uuid,
    pub title: String,
    pub implementation_item_id: Uuid,
    pub status: ItemStatus,
}

/// Technical specification, 1:1 from a functional spec
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalSpec {
    pub id: Uuid,
    pub title: String,
    pub functional_spec_id: Uuid,
    pub status: ItemStatus,
}

/// Denormalized trace link carried by a test case.
///
/// A test case verifies exactly one of: a requirement, an implementation
/// item, or a scope node. Multiple links may be populated on imported
/// data; the walkers check each one independently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceLink {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation_item_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_node_id: Option<Uuid>,
}

impl TraceLink {
    /// Link to a requirement only
    pub fn requirement(id: Uuid) -> Self {
        Self {
            requirement_id: Some(id),
            ..Default::default()
        }
    }

    /// Link to an implementation item only
    pub fn implementation_item(id: Uuid) -> Self {
        Self {
            implementation_item_id: Some(id),
            ..Default::default()
        }
    }

    /// Link to a scope node only
    pub fn scope_node(id: Uuid) -> Self {
        Self {
            scope_node_id: Some(id),
            ..Default::default()
        }
    }
}

/// Execution status of a test case
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TestStatus {
    NotRun,
    Passed,
    Failed,
    Blocked,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::NotRun => write!(f, "Not Run"),
            TestStatus::Passed => write!(f, "Passed"),
            TestStatus::Failed => write!(f, "Failed"),
            TestStatus::Blocked => write!(f, "Blocked"),
        }
    }
}

/// A test case verifying part of the delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub status: TestStatus,
    /// What this test verifies
    pub trace: TraceLink,
    pub tenant_id: Uuid,
    pub project_id: Uuid,
}

/// Severity of a defect
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum DefectSeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl fmt::Display for DefectSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefectSeverity::Critical => write!(f, "Critical"),
            DefectSeverity::High => write!(f, "High"),
            DefectSeverity::Medium => write!(f, "Medium"),
            DefectSeverity::Low => write!(f, "Low"),
        }
    }
}

/// Lifecycle status of a defect
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DefectStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl fmt::Display for DefectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefectStatus::Open => write!(f, "Open"),
            DefectStatus::InProgress => write!(f, "In Progress"),
            DefectStatus::Resolved => write!(f, "Resolved"),
            DefectStatus::Closed => write!(f, "Closed"),
        }
    }
}

/// A defect raised against a test case and/or a requirement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defect {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub severity: DefectSeverity,
    pub status: DefectStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_case_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement_id: Option<Uuid>,
    pub tenant_id: Uuid,
    pub project_id: Uuid,
}

/// Status of an open item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OpenItemStatus {
    Open,
    InProgress,
    Closed,
}

impl fmt::Display for OpenItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenItemStatus::Open => write!(f, "Open"),
            OpenItemStatus::InProgress => write!(f, "In Progress"),
            OpenItemStatus::Closed => write!(f, "Closed"),
        }
    }
}

impl OpenItemStatus {
    /// True while the item still needs resolution
    pub fn is_open(&self) -> bool {
        !matches!(self, OpenItemStatus::Closed)
    }
}

/// An open question/action raised during workshops
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenItem {
    pub id: Uuid,
    pub title: String,
    pub priority: Priority,
    pub status: OpenItemStatus,
    pub tenant_id: Uuid,
    pub project_id: Uuid,
}

/// How an open item relates to a requirement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LinkKind {
    /// The open item blocks the requirement
    Blocks,
    /// Informational association
    Related,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Blocks => write!(f, "blocks"),
            LinkKind::Related => write!(f, "related"),
        }
    }
}

/// Typed many-to-many edge between open items and requirements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenItemLink {
    pub id: Uuid,
    pub open_item_id: Uuid,
    pub requirement_id: Uuid,
    pub link_kind: LinkKind,
}

/// A fit/gap workshop covering part of the scope hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workshop {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    /// Scope context the workshop covers (usually an L2 or L3)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_node_id: Option<Uuid>,
    pub program_id: Uuid,
    pub tenant_id: Uuid,
    pub project_id: Uuid,
}

/// One session of a multi-session workshop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkshopSession {
    pub id: Uuid,
    pub workshop_id: Uuid,
    pub sequence_no: u32,
    /// Only decisions from the final session propagate upward
    pub is_final: bool,
}

/// A recorded decision attached to a process step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: Uuid,
    pub title: String,
    pub decided_at: DateTime<Utc>,
    pub process_step_id: Uuid,
}

/// Free-form discussion note attached to any entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentNote {
    pub id: Uuid,
    pub body: String,
    pub author: String,
    /// Type tag of the entity the note is attached to
    pub entity_kind: String,
    pub entity_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Top-level delivery program; the tenant/project scope root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub tenant_id: Uuid,
    pub project_id: Uuid,
}
