//! Artifact inventory for the active phase directory.
//!
//! The router never touches the filesystem. Callers either build an
//! [`ArtifactInventory`] from file names they already have, or use
//! [`ArtifactInventory::scan`] to list a phase directory.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::documents::extract_objective;
use super::phase::{Plan, PhaseNumber};

const PLAN_SUFFIX: &str = "-PLAN.md";
const SUMMARY_SUFFIX: &str = "-SUMMARY.md";
const ISSUES_SUFFIX: &str = "-ISSUES.md";
const FIX_MARKER: &str = "-FIX";
const HANDOFF_PREFIX: &str = ".continue-here";

/// Kind of workflow artifact, derived from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Plan,
    Summary,
    Issues,
    FixPlan,
    FixSummary,
    Handoff,
}

impl ArtifactKind {
    /// Classify a file name. Unrelated files yield `None`.
    pub fn classify(file_name: &str) -> Option<Self> {
        if file_name.starts_with(HANDOFF_PREFIX) && file_name.ends_with(".md") {
            return Some(Self::Handoff);
        }
        if let Some(base) = file_name.strip_suffix(PLAN_SUFFIX) {
            return Some(if base.contains(FIX_MARKER) { Self::FixPlan } else { Self::Plan });
        }
        if let Some(base) = file_name.strip_suffix(SUMMARY_SUFFIX) {
            return Some(if base.contains(FIX_MARKER) { Self::FixSummary } else { Self::Summary });
        }
        if file_name.ends_with(ISSUES_SUFFIX) {
            return Some(Self::Issues);
        }
        None
    }
}

/// Strip the artifact suffix: `02-01-PLAN.md` → `02-01`.
pub fn base_name(file_name: &str) -> &str {
    [PLAN_SUFFIX, SUMMARY_SUFFIX, ISSUES_SUFFIX]
        .iter()
        .find_map(|suffix| file_name.strip_suffix(suffix))
        .unwrap_or(file_name)
}

/// Files present in the active phase directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInventory {
    /// Directory the inventory was taken from
    pub phase_dir: Option<PathBuf>,

    /// Plan files (fix plans excluded)
    pub plans: BTreeSet<String>,

    /// Summary files (fix summaries excluded)
    pub summaries: BTreeSet<String>,

    /// Issue ledger files
    pub issues: BTreeSet<String>,

    /// Fix plan files
    pub fix_plans: BTreeSet<String>,

    /// Fix summary files
    pub fix_summaries: BTreeSet<String>,

    /// Paused-work handoff file, if any
    pub handoff: Option<String>,

    /// An agent was interrupted mid-run
    pub interrupted_agent: bool,

    /// Objectives read from plan bodies, keyed by plan file name
    pub objectives: BTreeMap<String, String>,
}

impl ArtifactInventory {
    /// Create an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an inventory from a list of file names.
    pub fn from_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut inventory = Self::new();
        for file in files {
            inventory.insert(file.as_ref());
        }
        inventory
    }

    /// Record a file. Returns its kind, or `None` if it is not an artifact.
    pub fn insert(&mut self, file_name: &str) -> Option<ArtifactKind> {
        let kind = ArtifactKind::classify(file_name)?;
        let name = file_name.to_string();
        match kind {
            ArtifactKind::Plan => {
                self.plans.insert(name);
            }
            ArtifactKind::Summary => {
                self.summaries.insert(name);
            }
            ArtifactKind::Issues => {
                self.issues.insert(name);
            }
            ArtifactKind::FixPlan => {
                self.fix_plans.insert(name);
            }
            ArtifactKind::FixSummary => {
                self.fix_summaries.insert(name);
            }
            ArtifactKind::Handoff => {
                // Lowest name wins so repeated scans agree.
                if self.handoff.as_ref().map_or(true, |existing| name < *existing) {
                    self.handoff = Some(name);
                }
            }
        }
        Some(kind)
    }

    /// Attach a plan objective.
    pub fn with_objective(mut self, plan: impl Into<String>, objective: impl Into<String>) -> Self {
        self.objectives.insert(plan.into(), objective.into());
        self
    }

    /// Mark an interrupted agent.
    pub fn with_interrupted_agent(mut self, interrupted: bool) -> Self {
        self.interrupted_agent = interrupted;
        self
    }

    /// Number of plan files.
    pub fn plan_count(&self) -> usize {
        self.plans.len()
    }

    /// Number of plans that have a matching summary.
    pub fn executed_count(&self) -> usize {
        self.plans.iter().filter(|plan| self.is_executed(plan)).count()
    }

    /// Whether a plan has a matching summary.
    pub fn is_executed(&self, plan: &str) -> bool {
        let base = base_name(plan);
        self.summaries.iter().any(|summary| base_name(summary) == base)
    }

    /// Plans without a summary, in ascending file name order.
    pub fn unexecuted_plans(&self) -> impl Iterator<Item = &str> {
        self.plans.iter().map(String::as_str).filter(|plan| !self.is_executed(plan))
    }

    /// Fix plans without a fix summary, in ascending file name order.
    pub fn unexecuted_fix_plans(&self) -> impl Iterator<Item = &str> {
        self.fix_plans.iter().map(String::as_str).filter(|plan| {
            let base = base_name(plan);
            !self.fix_summaries.iter().any(|summary| base_name(summary) == base)
        })
    }

    /// Issue ledgers with no fix plan prefixed by their base name.
    pub fn unplanned_issues(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().map(String::as_str).filter(|issue| {
            let base = base_name(issue);
            !self.fix_plans.iter().any(|plan| plan.starts_with(base))
        })
    }

    /// Typed plans for the given phase.
    pub fn plans_for(&self, phase: PhaseNumber) -> Vec<Plan> {
        self.plans
            .iter()
            .enumerate()
            .map(|(i, file)| Plan {
                phase,
                index: plan_index(file).unwrap_or(i as u32 + 1),
                file: file.clone(),
                executed: self.is_executed(file),
            })
            .collect()
    }

    /// List a phase directory.
    ///
    /// Unreadable directories produce an empty inventory. Plan bodies are
    /// read only to pick up objectives; a failed read just omits the entry.
    pub fn scan(phase_dir: &Path) -> Self {
        let mut inventory = Self { phase_dir: Some(phase_dir.to_path_buf()), ..Self::default() };

        for entry in WalkDir::new(phase_dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(dir = ?phase_dir, error = %e, "Failed to list phase directory");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else { continue };
            if inventory.insert(name) != Some(ArtifactKind::Plan) {
                continue;
            }

            match std::fs::read_to_string(entry.path()) {
                Ok(body) => {
                    if let Some(objective) = extract_objective(&body) {
                        inventory.objectives.insert(name.to_string(), objective);
                    }
                }
                Err(e) => {
                    tracing::debug!(plan = name, error = %e, "Skipping plan objective");
                }
            }
        }

        inventory
    }
}

/// Plan index from a name such as `02-03-PLAN.md`.
fn plan_index(file_name: &str) -> Option<u32> {
    base_name(file_name).split('-').nth(1).and_then(|part| part.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_classify() {
        assert_eq!(ArtifactKind::classify("01-01-PLAN.md"), Some(ArtifactKind::Plan));
        assert_eq!(ArtifactKind::classify("01-01-SUMMARY.md"), Some(ArtifactKind::Summary));
        assert_eq!(ArtifactKind::classify("01-01-ISSUES.md"), Some(ArtifactKind::Issues));
        assert_eq!(ArtifactKind::classify("01-01-FIX-PLAN.md"), Some(ArtifactKind::FixPlan));
        assert_eq!(ArtifactKind::classify("01-01-FIX-2-PLAN.md"), Some(ArtifactKind::FixPlan));
        assert_eq!(ArtifactKind::classify("01-01-FIX-SUMMARY.md"), Some(ArtifactKind::FixSummary));
        assert_eq!(ArtifactKind::classify(".continue-here.md"), Some(ArtifactKind::Handoff));
        assert_eq!(ArtifactKind::classify("01-CONTEXT.md"), None);
    }

    #[test]
    fn test_counts_and_matching() {
        let inventory = ArtifactInventory::from_files([
            "02-01-PLAN.md",
            "02-02-PLAN.md",
            "02-01-SUMMARY.md",
            "notes.txt",
        ]);
        assert_eq!(inventory.plan_count(), 2);
        assert_eq!(inventory.executed_count(), 1);
        assert_eq!(inventory.unexecuted_plans().collect::<Vec<_>>(), vec!["02-02-PLAN.md"]);
    }

    #[test]
    fn test_fix_and_issue_matching() {
        let inventory = ArtifactInventory::from_files([
            "02-01-ISSUES.md",
            "02-02-ISSUES.md",
            "02-01-FIX-PLAN.md",
            "02-01-FIX-SUMMARY.md",
        ]);
        assert_eq!(inventory.unexecuted_fix_plans().count(), 0);
        assert_eq!(inventory.unplanned_issues().collect::<Vec<_>>(), vec!["02-02-ISSUES.md"]);
    }

    #[test]
    fn test_plans_for_phase() {
        let inventory = ArtifactInventory::from_files(["03-02-PLAN.md", "03-02-SUMMARY.md"]);
        let plans = inventory.plans_for(PhaseNumber::from(3));
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].index, 2);
        assert!(plans[0].executed);
    }

    #[test]
    fn test_scan_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("01-01-PLAN.md"),
            "<objective>\nScaffold the crate\n</objective>\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("01-02-PLAN.md"), "# no objective").unwrap();
        std::fs::write(dir.path().join("01-01-SUMMARY.md"), "done").unwrap();
        std::fs::write(dir.path().join(".continue-here.md"), "paused").unwrap();

        let inventory = ArtifactInventory::scan(dir.path());
        assert_eq!(inventory.plan_count(), 2);
        assert_eq!(inventory.executed_count(), 1);
        assert_eq!(inventory.handoff.as_deref(), Some(".continue-here.md"));
        assert_eq!(
            inventory.objectives.get("01-01-PLAN.md").map(String::as_str),
            Some("Scaffold the crate")
        );
        assert!(!inventory.objectives.contains_key("01-02-PLAN.md"));
    }

    #[test]
    fn test_scan_missing_directory_is_empty() {
        let inventory = ArtifactInventory::scan(Path::new("/definitely/not/here"));
        assert_eq!(inventory.plan_count(), 0);
        assert!(inventory.handoff.is_none());
    }
}
