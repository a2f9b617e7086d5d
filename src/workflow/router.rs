//! Next-action routing.
//!
//! [`route`] maps the project state and the artifact inventory of the
//! active phase to exactly one recommended [`Action`]. Guards are checked in
//! a fixed order and the first match wins; the last guard always matches.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::inventory::{base_name, ArtifactInventory};
use super::phase::PhaseNumber;
use super::state::ProjectState;

/// The single recommended next step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Resume an agent run that was cut off
    ResumeInterrupted { agent_id: Option<String> },

    /// Pick up paused work from a handoff file
    ResumeWork { handoff: Option<String> },

    /// Execute a plan (regular or fix plan)
    ExecutePlan {
        plan: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        objective: Option<String>,
    },

    /// Write a fix plan for recorded issues
    PlanFix { issue: String },

    /// Write plans for a phase
    PlanPhase { phase: PhaseNumber },

    /// Every phase is executed; close out the milestone
    CompleteMilestone,

    /// Fall back to the suggestion stored in the state document
    UseStateSuggestion { suggestion: String },

    /// Nothing to recommend
    Unknown,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResumeInterrupted { agent_id: Some(id) } => {
                write!(f, "Resume interrupted agent {id}")
            }
            Self::ResumeInterrupted { agent_id: None } => write!(f, "Resume interrupted agent"),
            Self::ResumeWork { handoff: Some(path) } => write!(f, "Resume paused work from {path}"),
            Self::ResumeWork { handoff: None } => write!(f, "Resume paused work"),
            Self::ExecutePlan { plan, objective: Some(objective) } => {
                write!(f, "Execute {plan} ({objective})")
            }
            Self::ExecutePlan { plan, objective: None } => write!(f, "Execute {plan}"),
            Self::PlanFix { issue } => write!(f, "Plan fixes for {issue}"),
            Self::PlanPhase { phase } => write!(f, "Plan phase {phase}"),
            Self::CompleteMilestone => write!(f, "Complete milestone"),
            Self::UseStateSuggestion { suggestion } => write!(f, "{suggestion}"),
            Self::Unknown => write!(f, "No recommendation"),
        }
    }
}

/// Choose the next action.
///
/// Pure and idempotent: the same inputs always produce the same action.
pub fn route(state: &ProjectState, inventory: &ArtifactInventory) -> Action {
    let action = decide(state, inventory);
    tracing::debug!(?action, "Routed next action");
    action
}

fn decide(state: &ProjectState, inventory: &ArtifactInventory) -> Action {
    // 1. Interrupted agent
    if inventory.interrupted_agent || state.interrupted_agent_id.is_some() {
        return Action::ResumeInterrupted { agent_id: state.interrupted_agent_id.clone() };
    }

    // 2. Paused handoff
    if inventory.handoff.is_some() || state.handoff_present {
        return Action::ResumeWork { handoff: inventory.handoff.clone() };
    }

    // 3. Fix plan awaiting execution
    if let Some(fix_plan) = inventory.unexecuted_fix_plans().next() {
        return Action::ExecutePlan { plan: fix_plan.to_string(), objective: None };
    }

    // 4. Issues with no fix plan
    if let Some(issue) = inventory.unplanned_issues().next() {
        return Action::PlanFix { issue: base_name(issue).to_string() };
    }

    // 5. Plan awaiting execution
    if let Some(plan) = inventory.unexecuted_plans().next() {
        return Action::ExecutePlan {
            plan: plan.to_string(),
            objective: inventory.objectives.get(plan).cloned(),
        };
    }

    if let Some(current) = state.current_phase {
        let plan_count = inventory.plan_count();

        // 6. Phase not planned yet
        if plan_count == 0 {
            return Action::PlanPhase { phase: current };
        }

        // 7. Phase fully executed
        if inventory.executed_count() == plan_count {
            return match state.next_phase_after(current) {
                Some(next) => Action::PlanPhase { phase: next },
                None => Action::CompleteMilestone,
            };
        }
    }

    // 8. Catch-all
    match &state.continuity.next {
        Some(suggestion) => Action::UseStateSuggestion { suggestion: suggestion.clone() },
        None => Action::Unknown,
    }
}
