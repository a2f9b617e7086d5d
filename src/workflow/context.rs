//! Workflow context management.
//!
//! Reads the planning directory from disk and feeds it to the pure parts of
//! the workflow: state building, inventory and routing.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::documents::SummaryDoc;
use super::inventory::ArtifactInventory;
use super::phase::PhaseNumber;
use super::router::{route, Action};
use super::state::{build_project_state, ProjectState};
use crate::core::WorkflowConfig;

/// Planning directory of a project.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    /// Root directory
    pub root: PathBuf,

    /// Planning directory (`.planning`)
    pub planning_dir: PathBuf,

    /// Directory with one folder per phase
    pub phases_dir: PathBuf,

    agent_id_file: PathBuf,
}

impl WorkflowContext {
    /// Create a context with the default layout.
    pub fn new(root: PathBuf) -> Self {
        Self::with_config(root, &WorkflowConfig::default())
    }

    /// Create a context with a configured layout.
    pub fn with_config(root: PathBuf, config: &WorkflowConfig) -> Self {
        let planning_dir = root.join(&config.planning_dir);
        let phases_dir = planning_dir.join(&config.phases_dir);
        let agent_id_file = planning_dir.join(&config.agent_id_file);
        Self { root, planning_dir, phases_dir, agent_id_file }
    }

    /// Check if a planning directory exists.
    pub fn is_initialized(&self) -> bool {
        self.planning_dir.is_dir()
    }

    /// Read the roadmap and state documents and build the project state.
    ///
    /// Missing or unreadable documents are treated as empty.
    pub fn project_state(&self) -> ProjectState {
        let roadmap = read_or_empty(&self.planning_dir.join("ROADMAP.md"));
        let state = read_or_empty(&self.planning_dir.join("STATE.md"));

        let agent_id = std::fs::read_to_string(&self.agent_id_file).ok();
        let mut project = build_project_state(&roadmap, &state).with_interrupted_agent(agent_id);

        if let Some(dir) = project.current_phase.and_then(|p| self.phase_dir(p)) {
            project = project.with_handoff(ArtifactInventory::scan(&dir).handoff.is_some());
        }
        project
    }

    /// Find the directory of a phase (`phases/02-core`, `phases/02.1-hotfix`).
    pub fn phase_dir(&self, phase: PhaseNumber) -> Option<PathBuf> {
        let mut dirs: Vec<PathBuf> = WalkDir::new(&self.phases_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(dir_phase_number)
                    .is_some_and(|number| number == phase)
            })
            .map(|entry| entry.into_path())
            .collect();
        dirs.sort();
        dirs.into_iter().next()
    }

    /// Inventory of the current phase directory.
    ///
    /// A missing phase directory yields an empty inventory.
    pub fn inventory(&self, state: &ProjectState) -> ArtifactInventory {
        let mut inventory = state
            .current_phase
            .and_then(|p| self.phase_dir(p))
            .map(|dir| ArtifactInventory::scan(&dir))
            .unwrap_or_default();
        inventory.interrupted_agent = state.interrupted_agent_id.is_some();
        inventory
    }

    /// Load everything and pick the next action.
    pub fn next_action(&self) -> (ProjectState, Action) {
        let state = self.project_state();
        let inventory = self.inventory(&state);
        let action = route(&state, &inventory);
        (state, action)
    }

    /// Locate a plan file anywhere under the phases directory.
    pub fn find_plan(&self, name: &str) -> Option<PathBuf> {
        let direct = PathBuf::from(name);
        if direct.is_file() {
            return Some(direct);
        }
        WalkDir::new(&self.phases_dir)
            .max_depth(2)
            .into_iter()
            .filter_map(Result::ok)
            .find(|entry| entry.file_type().is_file() && entry.file_name().to_str() == Some(name))
            .map(|entry| entry.into_path())
    }

    /// Read the summary that belongs to a plan file.
    pub fn summary_for(&self, plan_path: &Path) -> Option<SummaryDoc> {
        let file_name = plan_path.file_name()?.to_str()?;
        let summary_name = file_name.strip_suffix("-PLAN.md")?.to_string() + "-SUMMARY.md";
        let content = std::fs::read_to_string(plan_path.with_file_name(summary_name)).ok()?;
        Some(SummaryDoc::parse(&content))
    }
}

impl Default for WorkflowContext {
    fn default() -> Self {
        Self::new(PathBuf::from("."))
    }
}

/// Phase number from a directory name such as `02.1-hotfix`.
fn dir_phase_number(name: &str) -> Option<PhaseNumber> {
    let prefix = name.split('-').next()?;
    prefix.parse().ok()
}

fn read_or_empty(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!(path = ?path, error = %e, "Document unavailable, treating as empty");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_workflow_context_new() {
        let ctx = WorkflowContext::new(PathBuf::from("/tmp/test"));
        assert_eq!(ctx.planning_dir, PathBuf::from("/tmp/test/.planning"));
        assert_eq!(ctx.phases_dir, PathBuf::from("/tmp/test/.planning/phases"));
        assert!(!ctx.is_initialized());
    }

    #[test]
    fn test_dir_phase_number() {
        assert_eq!(dir_phase_number("02-core"), Some(PhaseNumber::from(2)));
        assert_eq!(dir_phase_number("02.1-hotfix"), Some("2.1".parse().unwrap()));
        assert_eq!(dir_phase_number("notes"), None);
    }

    #[test]
    fn test_next_action_from_disk() {
        let dir = tempdir().unwrap();
        let ctx = WorkflowContext::new(dir.path().to_path_buf());
        write(
            &ctx.planning_dir.join("ROADMAP.md"),
            "- [x] Phase 1: Foundation - Base\n- [ ] Phase 2: Core - Features\n",
        );
        write(&ctx.planning_dir.join("STATE.md"), "## Current Position\nPhase: 2 of 2\n");
        write(&ctx.phases_dir.join("02-core").join("02-01-PLAN.md"), "## Objective\nShip core\n");

        let (state, action) = ctx.next_action();
        assert_eq!(state.current_phase, Some(PhaseNumber::from(2)));
        assert_eq!(
            action,
            Action::ExecutePlan {
                plan: "02-01-PLAN.md".to_string(),
                objective: Some("Ship core".to_string())
            }
        );
    }

    #[test]
    fn test_interrupted_agent_file() {
        let dir = tempdir().unwrap();
        let ctx = WorkflowContext::new(dir.path().to_path_buf());
        write(&ctx.planning_dir.join("ROADMAP.md"), "- [ ] Phase 1: Foundation - Base\n");
        write(&ctx.planning_dir.join("current-agent-id.txt"), "agent-9\n");

        let (state, action) = ctx.next_action();
        assert!(!state.handoff_present);
        assert_eq!(action, Action::ResumeInterrupted { agent_id: Some("agent-9".to_string()) });
    }

    #[test]
    fn test_missing_planning_dir() {
        let dir = tempdir().unwrap();
        let ctx = WorkflowContext::new(dir.path().to_path_buf());
        let (_, action) = ctx.next_action();
        assert_eq!(action, Action::Unknown);
    }

    #[test]
    fn test_summary_for_plan() {
        let dir = tempdir().unwrap();
        let ctx = WorkflowContext::new(dir.path().to_path_buf());
        let phase_dir = ctx.phases_dir.join("01-foundation");
        write(&phase_dir.join("01-01-PLAN.md"), "plan");
        write(&phase_dir.join("01-01-SUMMARY.md"), "## Accomplishments\n- Crate skeleton\n");

        let plan = ctx.find_plan("01-01-PLAN.md").unwrap();
        let summary = ctx.summary_for(&plan).unwrap();
        assert_eq!(summary.accomplishments, vec!["Crate skeleton"]);
    }
}
