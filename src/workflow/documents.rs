//! Workflow document parsing.
//!
//! Extracts typed entities from `ROADMAP.md`, `STATE.md`, plan and summary
//! documents. Every parser here is total: missing or malformed structure
//! yields empty collections and default values, never an error.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::phase::{normalize_phases, Milestone, MilestoneStatus, Phase, PhaseNumber};

/// Maximum number of decisions carried into the project state.
pub const MAX_RECENT_DECISIONS: usize = 5;

static PHASE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*[-*]\s*\[(?P<done>[ xX])\]\s*(?:\*\*)?Phase\s+(?P<num>\d+(?:\.\d+)?)(?::\s*|\s+)(?P<rest>.*)$",
    )
    .unwrap()
});

static PHASE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#{2,4}\s*Phase\s+(?P<num>\d+(?:\.\d+)?)\b").unwrap());

static PHASE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)phase\s+(?P<num>\d+(?:\.\d+)?)").unwrap());

static MILESTONE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*[-*]\s*(?P<lead>[^*v]*?)\**v(?P<ver>\d+(?:\.\d+)*)\s+(?P<name>[^*]+?)\**\s*[-–—]\s*Phases?\s+(?P<from>\d+(?:\.\d+)?)(?:\s*(?:-|–|to)\s*(?P<to>\d+(?:\.\d+)?))?(?P<tail>.*)$",
    )
    .unwrap()
});

static PROGRESS_GAUGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[█▓▒░]+\]?\s*(?P<pct>\d{1,3})\s*%").unwrap());

static POSITION_OF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<num>\d+(?:\.\d+)?)(?:\s+of\s+(?P<total>\d+))?").unwrap()
});

/// Roadmap document: phases and milestones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoadmapDoc {
    /// Project name (from title)
    pub project: String,

    /// Phases, sorted numerically
    pub phases: Vec<Phase>,

    /// Milestones in document order
    pub milestones: Vec<Milestone>,
}

impl RoadmapDoc {
    /// Parse from markdown content.
    pub fn parse(content: &str) -> Self {
        let mut doc = Self::default();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with("# ") && doc.project.is_empty() {
                doc.project = trimmed
                    .trim_start_matches("# ")
                    .trim_start_matches("Roadmap:")
                    .trim_end_matches("Roadmap")
                    .trim()
                    .to_string();
                continue;
            }

            if let Some(phase) = parse_phase_line(line) {
                doc.phases.push(phase);
            }
        }

        normalize_phases(&mut doc.phases);
        apply_dependency_overrides(&mut doc.phases, content);

        doc.milestones = section_lines(content, |h| h.contains("milestones"))
            .filter_map(parse_milestone_line)
            .collect();

        doc
    }

    /// Look up a phase by number.
    pub fn phase(&self, number: PhaseNumber) -> Option<&Phase> {
        self.phases.iter().find(|p| p.number == number)
    }

    /// First phase not yet checked off.
    pub fn first_incomplete(&self) -> Option<&Phase> {
        self.phases.iter().find(|p| !p.complete)
    }
}

/// Parse a single roadmap phase line.
///
/// Accepts `- [ ] **Phase 2.1: Name** - Goal` and looser variants (no bold,
/// space instead of colon, en/em dash). A missing goal becomes an empty
/// string.
pub fn parse_phase_line(line: &str) -> Option<Phase> {
    let caps = PHASE_LINE.captures(line)?;
    let number: PhaseNumber = caps["num"].parse().ok()?;
    let rest = caps["rest"].replace("**", "");

    let (name, goal) = split_dash(&rest);
    if name.is_empty() {
        return None;
    }

    let mut phase = Phase::new(number, name, goal);
    phase.complete = !caps["done"].trim().is_empty();
    Some(phase)
}

/// Parse a milestone list entry, e.g. `- ✅ **v1.0 MVP** - Phases 1-4 (shipped)`.
pub fn parse_milestone_line(line: &str) -> Option<Milestone> {
    let caps = MILESTONE_LINE.captures(line)?;
    let first_phase: PhaseNumber = caps["from"].parse().ok()?;
    let last_phase = caps
        .name("to")
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(first_phase);

    let tail = caps["tail"].to_lowercase();
    let status = if caps["lead"].contains('✅') || tail.contains("shipped") || tail.contains("complete")
    {
        MilestoneStatus::Complete
    } else {
        MilestoneStatus::InProgress
    };

    Some(Milestone {
        number: caps["ver"].to_string(),
        name: caps["name"].trim().to_string(),
        first_phase,
        last_phase,
        status,
    })
}

/// Apply `**Depends on**:` lines from `### Phase N` detail blocks.
fn apply_dependency_overrides(phases: &mut [Phase], content: &str) {
    let first = phases.first().map(|p| p.number);
    let mut current: Option<PhaseNumber> = None;

    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(caps) = PHASE_HEADER.captures(trimmed) {
            current = caps["num"].parse().ok();
            continue;
        }
        if trimmed.starts_with('#') {
            current = None;
            continue;
        }

        let Some(number) = current else { continue };
        let (key, value) = match split_key_value(trimmed) {
            Some(kv) => kv,
            None => continue,
        };
        if key != "depends on" || Some(number) == first {
            continue;
        }

        let lower = value.to_lowercase();
        let dependency = if lower.starts_with("nothing") || lower.starts_with("none") {
            None
        } else if let Some(caps) = PHASE_REF.captures(&value) {
            caps["num"].parse().ok()
        } else {
            continue;
        };

        if let Some(phase) = phases.iter_mut().find(|p| p.number == number) {
            phase.depends_on = dependency;
        }
    }
}

/// A recorded project decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// First column (usually the phase the decision was made in)
    pub context: String,

    /// Second column (what was decided)
    pub decision: String,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "{}", self.decision)
        } else {
            write!(f, "{}: {}", self.context, self.decision)
        }
    }
}

/// Hints about where the previous session stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContinuity {
    /// When the last session ended
    pub last_session: Option<String>,

    /// What was being worked on
    pub stopped_at: Option<String>,

    /// Suggested next step
    pub next: Option<String>,

    /// File to resume from
    pub resume_file: Option<String>,
}

impl SessionContinuity {
    /// Whether no field was found.
    pub fn is_empty(&self) -> bool {
        self.last_session.is_none()
            && self.stopped_at.is_none()
            && self.next.is_none()
            && self.resume_file.is_none()
    }
}

/// State document: current position, decisions, continuity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateDoc {
    /// Phase from the `Current Position` section
    pub current_phase: Option<PhaseNumber>,

    /// Total phases as stated in `Phase: N of M`
    pub total_phases: Option<usize>,

    /// Plan position text, e.g. `1 of 3`
    pub current_plan: Option<String>,

    /// Overall status line
    pub status: Option<String>,

    /// Progress percentage (0 when no gauge is present)
    pub progress: u8,

    /// Last few decisions, in document order
    pub decisions: Vec<Decision>,

    /// Deferred issues and open concerns
    pub issues: Vec<String>,

    /// Session continuity section
    pub continuity: SessionContinuity,
}

impl StateDoc {
    /// Parse from markdown content.
    pub fn parse(content: &str) -> Self {
        let mut doc = Self {
            progress: parse_progress(content),
            decisions: parse_decisions(content),
            continuity: parse_session_continuity(content),
            ..Self::default()
        };

        for line in section_lines(content, |h| h.contains("current position")) {
            let Some((key, value)) = split_key_value(line) else { continue };
            match key.as_str() {
                "phase" => {
                    if let Some(caps) = POSITION_OF.captures(&value) {
                        doc.current_phase = caps["num"].parse().ok();
                        doc.total_phases = caps.name("total").and_then(|m| m.as_str().parse().ok());
                    }
                }
                "plan" => {
                    if !is_placeholder(&value) {
                        doc.current_plan = Some(value);
                    }
                }
                "status" => {
                    if !value.is_empty() {
                        doc.status = Some(value);
                    }
                }
                _ => {}
            }
        }

        doc.issues = section_lines(content, |h| {
            h.contains("deferred issues") || h.contains("blockers") || h.contains("concerns")
        })
        .filter_map(parse_list_item)
        .filter(|item| !is_placeholder(item))
        .collect();

        doc
    }
}

/// Read the progress gauge (`[████░░░░░░] 40%`). Absent gauge yields 0.
pub fn parse_progress(content: &str) -> u8 {
    PROGRESS_GAUGE
        .captures(content)
        .and_then(|caps| caps["pct"].parse::<u16>().ok())
        .map(|pct| pct.min(100) as u8)
        .unwrap_or(0)
}

/// Read the decisions section, keeping at most the last five entries.
///
/// Table rows render as `"<col0>: <col1>"`. The header row and the
/// `|---|` separator are skipped; bullet items are accepted as well.
pub fn parse_decisions(content: &str) -> Vec<Decision> {
    let lines: Vec<&str> = section_lines(content, |h| h.contains("decisions")).collect();
    let mut decisions = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if line.starts_with('|') {
            let cells = table_cells(line);
            if is_separator_row(&cells) {
                continue;
            }
            let next_is_separator =
                lines.get(i + 1).is_some_and(|next| is_separator_row(&table_cells(next)));
            if next_is_separator {
                continue;
            }
            let context = cells.first().cloned().unwrap_or_default();
            let decision = cells.get(1).cloned().unwrap_or_default();
            if is_placeholder(&context) && is_placeholder(&decision) {
                continue;
            }
            decisions.push(Decision { context, decision });
        } else if let Some(item) = parse_list_item(line) {
            if is_placeholder(&item) {
                continue;
            }
            let decision = match item.split_once(':') {
                Some((ctx, rest)) if ctx.starts_with('[') => Decision {
                    context: ctx.trim_matches(|c| c == '[' || c == ']').trim().to_string(),
                    decision: rest.trim().to_string(),
                },
                _ => Decision { context: String::new(), decision: item },
            };
            decisions.push(decision);
        }
    }

    let skip = decisions.len().saturating_sub(MAX_RECENT_DECISIONS);
    decisions.into_iter().skip(skip).collect()
}

/// Read the `Session Continuity` section. Missing fields stay unset.
pub fn parse_session_continuity(content: &str) -> SessionContinuity {
    let mut continuity = SessionContinuity::default();

    for line in section_lines(content, |h| h.contains("session continuity")) {
        let Some((key, value)) = split_key_value(line) else { continue };
        if is_placeholder(&value) {
            continue;
        }
        match key.as_str() {
            "last session" => continuity.last_session = Some(value),
            "stopped at" => continuity.stopped_at = Some(value),
            "next" | "next step" | "next action" => continuity.next = Some(value),
            "resume file" => continuity.resume_file = Some(value),
            _ => {}
        }
    }

    continuity
}

/// Summary document: what an executed plan delivered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryDoc {
    /// Accomplishment bullets
    pub accomplishments: Vec<String>,

    /// Files created or modified
    pub files: Vec<String>,
}

impl SummaryDoc {
    /// Parse from markdown content.
    pub fn parse(content: &str) -> Self {
        let accomplishments = section_lines(content, |h| h.contains("accomplishments"))
            .filter_map(parse_list_item)
            .filter(|item| !is_placeholder(item))
            .collect();

        let files = section_lines(content, |h| h.starts_with("files"))
            .filter_map(parse_list_item)
            .map(|item| match item.split('`').nth(1) {
                Some(path) if !path.is_empty() => path.to_string(),
                _ => item,
            })
            .collect();

        Self { accomplishments, files }
    }
}

/// Extract a plan's objective.
///
/// Looks for an `<objective>` block first, then an `Objective` section.
/// Returns the first non-empty line.
pub fn extract_objective(plan: &str) -> Option<String> {
    if let Some(start) = plan.find("<objective>") {
        let body = &plan[start + "<objective>".len()..];
        let body = body.split("</objective>").next().unwrap_or(body);
        if let Some(line) = first_text_line(body.lines()) {
            return Some(line);
        }
    }

    first_text_line(section_lines(plan, |h| h.starts_with("objective")))
}

// Helper functions

/// Lines between a header matching `matches` and the next header of any level.
///
/// `matches` receives the lowercased header text without `#` markers.
fn section_lines<'a, F>(content: &'a str, matches: F) -> impl Iterator<Item = &'a str> + 'a
where
    F: Fn(&str) -> bool + 'a,
{
    let mut inside = false;
    content.lines().filter_map(move |line| {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            let header = trimmed.trim_start_matches('#').trim().to_lowercase();
            inside = matches(&header);
            return None;
        }
        if inside && !trimmed.is_empty() {
            Some(trimmed)
        } else {
            None
        }
    })
}

fn first_text_line<'a>(lines: impl Iterator<Item = &'a str>) -> Option<String> {
    lines
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('<') && !line.starts_with('#'))
        .map(ToString::to_string)
}

/// Split `Name - goal` on the first dash separator.
fn split_dash(text: &str) -> (String, String) {
    for sep in [" - ", " – ", " — "] {
        if let Some((name, goal)) = text.split_once(sep) {
            return (name.trim().to_string(), goal.trim().to_string());
        }
    }
    (text.trim().trim_end_matches(['-', '–', '—']).trim().to_string(), String::new())
}

/// Split `- **Key:** value` into a lowercased key and trimmed value.
fn split_key_value(line: &str) -> Option<(String, String)> {
    let line = line.trim().trim_start_matches(['-', '*', ' ']);
    let (key, value) = line.split_once(':')?;
    let key = key.replace("**", "").trim().to_lowercase();
    let value = value.trim().trim_start_matches("**").trim().to_string();
    Some((key, value))
}

fn parse_list_item(line: &str) -> Option<String> {
    let line = line.trim();
    let item = if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        rest.trim_start_matches("[ ] ").trim_start_matches("[x] ").to_string()
    } else if line.chars().next().is_some_and(|c| c.is_ascii_digit()) && line.contains(". ") {
        line.split_once(". ").map(|(_, rest)| rest.to_string())?
    } else {
        return None;
    };
    let item = item.trim().to_string();
    if item.is_empty() {
        None
    } else {
        Some(item)
    }
}

fn table_cells(line: &str) -> Vec<String> {
    line.trim()
        .trim_matches('|')
        .split('|')
        .map(|cell| cell.trim().to_string())
        .collect()
}

fn is_separator_row(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells.iter().all(|cell| {
            let inner = cell.trim_matches(':');
            !inner.is_empty() && inner.chars().all(|c| c == '-')
        })
}

fn is_placeholder(value: &str) -> bool {
    let lower = value.trim().trim_matches(|c| c == '(' || c == ')').to_lowercase();
    matches!(lower.as_str(), "" | "-" | "none" | "none yet" | "n/a" | "[none yet]")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(s: &str) -> PhaseNumber {
        s.parse().unwrap()
    }

    const ROADMAP: &str = r#"# Roadmap: Waymark

## Milestones

- ✅ **v1.0 MVP** - Phases 1-2 (shipped 2025-01-10)
- 🚧 **v1.1 Polish** - Phases 3-4 (in progress)

## Phases

- [x] **Phase 1: Foundation** - Set up the project
- [ ] **Phase 2: Core Features** - Build the main flows
- [x] **Phase 1.5: Hotfix (INSERTED)** - Patch auth
- [ ] **Phase 3: Polish**
- [ ] Phase 4 Release – Ship it

## Phase Details

### Phase 3: Polish
**Goal**: Make it shine
**Depends on**: Phase 1.5

### Phase 4: Release
**Depends on**: Nothing (can ship independently)
"#;

    #[test]
    fn test_roadmap_phases_sorted_numerically() {
        let doc = RoadmapDoc::parse(ROADMAP);
        let numbers: Vec<String> = doc.phases.iter().map(|p| p.number.to_string()).collect();
        assert_eq!(numbers, vec!["1", "1.5", "2", "3", "4"]);
        assert_eq!(doc.project, "Waymark");
    }

    #[test]
    fn test_roadmap_phase_fields() {
        let doc = RoadmapDoc::parse(ROADMAP);
        let foundation = doc.phase(num("1")).unwrap();
        assert_eq!(foundation.name, "Foundation");
        assert_eq!(foundation.goal, "Set up the project");
        assert!(foundation.complete);
        assert_eq!(foundation.depends_on, None);

        let polish = doc.phase(num("3")).unwrap();
        assert_eq!(polish.goal, "");
        assert_eq!(polish.depends_on, Some(num("1.5")));

        let release = doc.phase(num("4")).unwrap();
        assert_eq!(release.name, "Release");
        assert_eq!(release.goal, "Ship it");
        assert_eq!(release.depends_on, None);

        // Default dependency is the preceding phase in numeric order
        assert_eq!(doc.phase(num("2")).unwrap().depends_on, Some(num("1.5")));
        assert_eq!(doc.first_incomplete().unwrap().number, num("2"));
    }

    #[test]
    fn test_phase_sort_one_two_one_point_five() {
        let content = "- [ ] Phase 1: A - a\n- [ ] Phase 2: B - b\n- [ ] Phase 1.5: C - c\n";
        let doc = RoadmapDoc::parse(content);
        let numbers: Vec<f64> = doc.phases.iter().map(|p| p.number.value()).collect();
        assert_eq!(numbers, vec![1.0, 1.5, 2.0]);
    }

    #[test]
    fn test_roadmap_milestones() {
        let doc = RoadmapDoc::parse(ROADMAP);
        assert_eq!(doc.milestones.len(), 2);
        assert_eq!(doc.milestones[0].number, "1.0");
        assert_eq!(doc.milestones[0].name, "MVP");
        assert_eq!(doc.milestones[0].status, MilestoneStatus::Complete);
        assert_eq!(doc.milestones[1].first_phase, num("3"));
        assert_eq!(doc.milestones[1].last_phase, num("4"));
        assert_eq!(doc.milestones[1].status, MilestoneStatus::InProgress);
    }

    #[test]
    fn test_roadmap_garbage_is_empty() {
        let doc = RoadmapDoc::parse("just some text\n| not | a | roadmap |\n");
        assert!(doc.phases.is_empty());
        assert!(doc.milestones.is_empty());
        assert!(RoadmapDoc::parse("").phases.is_empty());
    }

    const STATE: &str = r#"# Project State

## Current Position

Phase: 2 of 4 (Core Features)
Plan: 1 of 3 in current phase
Status: In progress

Progress: [████░░░░░░] 40%

## Accumulated Context

### Decisions

| Phase | Decision | Rationale |
|-------|----------|-----------|
| 1 | Use SQLite | Simple |
| 1 | Use axum | Familiar |
| 2 | JWT auth | Stateless |
| 2 | No ORM | Control |
| 2 | Tokio | Async |
| 2 | Serde | Standard |

### Deferred Issues

- ISS-001: Flaky login test
- None

### Blockers/Concerns

None yet.

## Session Continuity

Last session: 2025-01-10 14:30
Stopped at: Completed 02-01-PLAN.md
Resume file: None
"#;

    #[test]
    fn test_state_position() {
        let doc = StateDoc::parse(STATE);
        assert_eq!(doc.current_phase, Some(num("2")));
        assert_eq!(doc.total_phases, Some(4));
        assert_eq!(doc.current_plan.as_deref(), Some("1 of 3 in current phase"));
        assert_eq!(doc.status.as_deref(), Some("In progress"));
        assert_eq!(doc.progress, 40);
        assert_eq!(doc.issues, vec!["ISS-001: Flaky login test".to_string()]);
    }

    #[test]
    fn test_decisions_last_five() {
        let decisions = parse_decisions(STATE);
        assert_eq!(decisions.len(), 5);
        assert_eq!(decisions[0].to_string(), "1: Use axum");
        assert_eq!(decisions[4].to_string(), "2: Serde");
    }

    #[test]
    fn test_decisions_bullets() {
        let content = "## Decisions\n\n- [Phase 1]: Use Rust\n- Keep it simple\n\n## Next\n- ignored\n";
        let decisions = parse_decisions(content);
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].to_string(), "Phase 1: Use Rust");
        assert_eq!(decisions[1].to_string(), "Keep it simple");
    }

    #[test]
    fn test_progress_absent_is_zero() {
        assert_eq!(parse_progress("Progress: unknown"), 0);
        assert_eq!(parse_progress("[██████████] 100%"), 100);
    }

    #[test]
    fn test_session_continuity() {
        let continuity = parse_session_continuity(STATE);
        assert_eq!(continuity.last_session.as_deref(), Some("2025-01-10 14:30"));
        assert_eq!(continuity.stopped_at.as_deref(), Some("Completed 02-01-PLAN.md"));
        assert_eq!(continuity.resume_file, None);
        assert_eq!(continuity.next, None);

        let bold = "## Session Continuity\n- **Next:** Run verification\n";
        assert_eq!(parse_session_continuity(bold).next.as_deref(), Some("Run verification"));
        assert!(parse_session_continuity("").is_empty());
    }

    #[test]
    fn test_state_garbage_defaults() {
        let doc = StateDoc::parse("%%% nothing useful %%%");
        assert_eq!(doc.current_phase, None);
        assert_eq!(doc.progress, 0);
        assert!(doc.decisions.is_empty());
        assert!(doc.continuity.is_empty());
    }

    #[test]
    fn test_summary_doc() {
        let content = r#"# Phase 2 Plan 1: Auth Summary

## Accomplishments

- Login form with validation
- Session cookie handling

## Files Created/Modified

- `src/auth/login.rs` - form handler
- `src/auth/session.rs`

## Next Step
Ready for 02-02
"#;
        let doc = SummaryDoc::parse(content);
        assert_eq!(doc.accomplishments.len(), 2);
        assert_eq!(doc.files, vec!["src/auth/login.rs", "src/auth/session.rs"]);
    }

    #[test]
    fn test_extract_objective() {
        let tagged = "---\nphase: 02\n---\n<objective>\nBuild the login flow.\n\nPurpose: auth\n</objective>\n";
        assert_eq!(extract_objective(tagged).as_deref(), Some("Build the login flow."));

        let section = "# Plan\n\n## Objective\n\nWire up sessions.\n\n## Tasks\n";
        assert_eq!(extract_objective(section).as_deref(), Some("Wire up sessions."));

        assert_eq!(extract_objective("# Plan\nno objective here"), None);
    }
}
