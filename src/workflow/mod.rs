//! Workflow tracking for staged project delivery.
//!
//! Reads GSD-style planning documents and decides what to do next.
//!
//! ## Documents
//!
//! - `ROADMAP.md` - Phases, milestones, phase dependencies
//! - `STATE.md` - Current position, decisions, issues, session continuity
//! - `phases/NN-slug/` - Plans, summaries, issue ledgers and fix plans
//!
//! ## Routing
//!
//! - [`build_project_state`] - Parse the documents into a [`ProjectState`]
//! - [`ArtifactInventory`] - What exists in the active phase directory
//! - [`route`] - Pick exactly one next [`Action`]

mod context;
mod documents;
mod inventory;
mod phase;
mod router;
mod state;

pub use context::WorkflowContext;
pub use documents::{
    extract_objective, parse_decisions, parse_milestone_line, parse_phase_line, parse_progress,
    parse_session_continuity, Decision, RoadmapDoc, SessionContinuity, StateDoc, SummaryDoc,
    MAX_RECENT_DECISIONS,
};
pub use inventory::{base_name, ArtifactInventory, ArtifactKind};
pub use phase::{normalize_phases, Milestone, MilestoneStatus, Phase, PhaseNumber, Plan};
pub use router::{route, Action};
pub use state::{build_project_state, ProjectState};
