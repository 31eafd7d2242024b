use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Traceability and fit/gap assessment engine")]
pub struct Cli {
    /// Path to a YAML data file
    #[clap(long)]
    pub file: Option<String>,

    /// Path to a SQLite database file (overrides --file)
    #[clap(long)]
    pub db: Option<String>,

    /// Tenant scope for scoped commands
    #[clap(long)]
    pub tenant: Option<Uuid>,

    /// Project scope for scoped commands
    #[clap(long, short = 'p')]
    pub project: Option<Uuid>,

    /// Emit JSON instead of terminal output
    #[clap(long)]
    pub json: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum FitCommand {
    /// Show the system-suggested fit for a node without writing anything
    Suggest {
        /// Node ID
        id: Uuid,
    },

    /// Recompute and store the consolidated decision for a node
    Recalc {
        /// Node ID
        id: Uuid,
    },

    /// Override the consolidated decision on a node
    Override {
        /// Node ID
        id: Uuid,

        /// New status (fit, gap, partial_fit)
        #[clap(long)]
        status: String,

        /// Mandatory rationale for the override
        #[clap(long)]
        rationale: String,

        /// Who is overriding
        #[clap(long, default_value = "cli")]
        actor: String,
    },

    /// Record a leaf decision and propagate it upward
    Propagate {
        /// L4 leaf node ID
        id: Uuid,

        /// Decision (fit, gap, partial_fit)
        #[clap(long)]
        status: String,

        /// Treat this as a final-session decision
        #[clap(long)]
        r#final: bool,
    },

    /// Sign off an L3 scope item
    Signoff {
        /// L3 node ID
        id: Uuid,

        /// Decision (fit, gap, partial_fit)
        #[clap(long)]
        status: String,

        /// Rationale, required when disagreeing with the suggestion
        #[clap(long)]
        rationale: Option<String>,

        /// Who is signing off
        #[clap(long, default_value = "cli")]
        actor: String,

        /// Sign off despite unmet preconditions
        #[clap(long)]
        force: bool,
    },

    /// Recompute and show readiness for a node
    Readiness {
        /// Node ID
        id: Uuid,
    },
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the traceability chain for any entity
    Trace {
        /// Entity type tag (requirement, test_case, scope_node, ...)
        #[clap(long, short = 't', default_value = "requirement")]
        r#type: String,

        /// Entity ID
        id: Uuid,
    },

    /// Show lateral links (open items, decisions, notes) for a requirement
    Links {
        /// Requirement ID
        id: Uuid,
    },

    /// Coverage summary for a program
    Summary {
        /// Program ID
        id: Uuid,
    },

    /// List implementation items or requirements with no test evidence
    Untested {
        /// What to list: items or requirements
        #[clap(long, default_value = "items")]
        kind: String,
    },

    /// Fit/gap aggregation operations
    #[clap(subcommand)]
    Fit(FitCommand),

    /// Trace every defect under a process hierarchy node
    DefectsByProcess {
        /// Scope node ID
        id: Uuid,
    },

    /// Create an empty YAML data file
    Init,
}
