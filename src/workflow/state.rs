//! Project state aggregate.
//!
//! Rebuilt from raw document text on every call. Nothing here is cached or
//! persisted.

use serde::{Deserialize, Serialize};

use super::documents::{Decision, RoadmapDoc, SessionContinuity, StateDoc};
use super::phase::{Milestone, MilestoneStatus, Phase, PhaseNumber};

/// Everything the router needs to know about the project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectState {
    /// Project name from the roadmap title
    pub project: String,

    /// Phases, sorted numerically
    pub phases: Vec<Phase>,

    /// Milestones from the roadmap
    pub milestones: Vec<Milestone>,

    /// Phase currently being worked on
    pub current_phase: Option<PhaseNumber>,

    /// Number of phases in the roadmap
    pub total_phases: usize,

    /// Progress percentage from the state gauge
    pub progress: u8,

    /// Most recent decisions (at most five, document order)
    pub decisions: Vec<Decision>,

    /// Deferred issues and concerns
    pub issues: Vec<String>,

    /// Where the last session left off
    pub continuity: SessionContinuity,

    /// A paused-work handoff is present
    pub handoff_present: bool,

    /// Identifier of an interrupted agent run
    pub interrupted_agent_id: Option<String>,
}

impl ProjectState {
    /// Attach handoff presence.
    pub fn with_handoff(mut self, present: bool) -> Self {
        self.handoff_present = present;
        self
    }

    /// Attach an interrupted agent id. Blank ids are ignored.
    pub fn with_interrupted_agent(mut self, agent_id: Option<String>) -> Self {
        self.interrupted_agent_id =
            agent_id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty());
        self
    }

    /// The current phase entry, if it exists in the roadmap.
    pub fn current(&self) -> Option<&Phase> {
        let number = self.current_phase?;
        self.phases.iter().find(|p| p.number == number)
    }

    /// Smallest phase number strictly after `after`.
    pub fn next_phase_after(&self, after: PhaseNumber) -> Option<PhaseNumber> {
        self.phases.iter().map(|p| p.number).filter(|n| *n > after).min()
    }

    /// The milestone covering the current phase, or the first one in progress.
    pub fn current_milestone(&self) -> Option<&Milestone> {
        self.current_phase
            .and_then(|phase| self.milestones.iter().find(|m| m.covers(phase)))
            .or_else(|| self.milestones.iter().find(|m| m.status == MilestoneStatus::InProgress))
    }
}

/// Build the project state from raw `ROADMAP.md` and `STATE.md` text.
///
/// The current phase comes from the state document when it names one;
/// otherwise the first unchecked roadmap phase, then the last phase.
pub fn build_project_state(raw_roadmap: &str, raw_state: &str) -> ProjectState {
    let roadmap = RoadmapDoc::parse(raw_roadmap);
    let state = StateDoc::parse(raw_state);

    let current_phase = state
        .current_phase
        .or_else(|| roadmap.first_incomplete().map(|p| p.number))
        .or_else(|| roadmap.phases.last().map(|p| p.number));

    let total_phases = if roadmap.phases.is_empty() {
        state.total_phases.unwrap_or(0)
    } else {
        roadmap.phases.len()
    };

    tracing::debug!(
        phases = roadmap.phases.len(),
        current = ?current_phase.map(|p| p.to_string()),
        "Built project state"
    );

    ProjectState {
        project: roadmap.project,
        phases: roadmap.phases,
        milestones: roadmap.milestones,
        current_phase,
        total_phases,
        progress: state.progress,
        decisions: state.decisions,
        issues: state.issues,
        continuity: state.continuity,
        handoff_present: false,
        interrupted_agent_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROADMAP: &str = r#"# Roadmap: Demo

## Milestones

- 🚧 **v1.0 MVP** - Phases 1-3 (in progress)

## Phases

- [x] **Phase 1: Foundation** - Scaffolding
- [ ] **Phase 2: Core** - Features
- [ ] **Phase 3: Launch** - Release
"#;

    #[test]
    fn test_current_phase_from_state() {
        let state = build_project_state(ROADMAP, "## Current Position\n\nPhase: 3 of 3\n");
        assert_eq!(state.current_phase, Some(PhaseNumber::from(3)));
        assert_eq!(state.total_phases, 3);
        assert_eq!(state.current().unwrap().name, "Launch");
    }

    #[test]
    fn test_current_phase_falls_back_to_first_incomplete() {
        let state = build_project_state(ROADMAP, "");
        assert_eq!(state.current_phase, Some(PhaseNumber::from(2)));
        assert_eq!(state.current_milestone().unwrap().name, "MVP");
    }

    #[test]
    fn test_all_complete_falls_back_to_last() {
        let roadmap = "- [x] Phase 1: A - a\n- [x] Phase 2: B - b\n";
        let state = build_project_state(roadmap, "");
        assert_eq!(state.current_phase, Some(PhaseNumber::from(2)));
    }

    #[test]
    fn test_empty_documents() {
        let state = build_project_state("", "");
        assert!(state.phases.is_empty());
        assert_eq!(state.current_phase, None);
        assert_eq!(state.total_phases, 0);
        assert_eq!(state.progress, 0);
    }

    #[test]
    fn test_next_phase_after() {
        let roadmap = "- [ ] Phase 1: A\n- [ ] Phase 2: B\n- [ ] Phase 1.1: C\n";
        let state = build_project_state(roadmap, "");
        assert_eq!(state.next_phase_after(PhaseNumber::from(1)), Some("1.1".parse().unwrap()));
        assert_eq!(state.next_phase_after(PhaseNumber::from(2)), None);
    }

    #[test]
    fn test_interrupted_agent_blank_ignored() {
        let state = ProjectState::default().with_interrupted_agent(Some("  ".to_string()));
        assert_eq!(state.interrupted_agent_id, None);
        let state = ProjectState::default().with_interrupted_agent(Some("agent-7\n".to_string()));
        assert_eq!(state.interrupted_agent_id.as_deref(), Some("agent-7"));
    }
}
