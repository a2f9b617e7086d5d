//! Issue ledger and recorder.
//!
//! Fail and partial results of a finished session become issues appended to
//! the plan's `NN-MM-ISSUES.md` ledger. The ledger has an "Open Issues"
//! section written here and a "Resolved Issues" section that is only ever
//! carried through untouched.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::session::{Severity, VerificationSession};
use crate::workflow::base_name;

const OPEN_HEADER: &str = "## Open Issues";
const RESOLVED_HEADER: &str = "## Resolved Issues";
const NONE_YET: &str = "[None yet]";

/// `### UAT-001: Feature`; prefixes may contain hyphens (`UAT-WEB-001`).
static ENTRY_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^###\s+([A-Za-z][A-Za-z0-9_-]*-\d+):\s*(.*)$").unwrap());

static ISSUE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^###\s+([A-Za-z][A-Za-z0-9_-]*?)-(\d+):").unwrap());

/// A defect found during verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// `PREFIX-NNN`
    pub id: String,

    /// Test item the issue was found in
    pub feature: String,

    pub severity: Severity,

    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,

    /// Date the issue was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered: Option<NaiveDate>,

    /// Phase-plan reference, e.g. `02-01`
    pub plan_ref: String,

    /// Session that recorded the issue: `<key> <started_at>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,

    /// Free text kept under the entry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,

    /// Resolution happens outside this crate
    #[serde(default)]
    pub resolved: bool,
}

impl Issue {
    fn render(&self, out: &mut String) {
        let _ = writeln!(out, "### {}: {}", self.id, self.feature);
        out.push('\n');
        if let Some(date) = self.discovered {
            let _ = writeln!(out, "**Discovered:** {}", date.format("%Y-%m-%d"));
        }
        let _ = writeln!(out, "**Phase/Plan:** {}", self.plan_ref);
        let _ = writeln!(out, "**Severity:** {}", self.severity);
        let _ = writeln!(out, "**Feature:** {}", self.feature);
        let _ = writeln!(out, "**Description:** {}", self.description);
        if let Some(expected) = &self.expected {
            let _ = writeln!(out, "**Expected:** {expected}");
        }
        if let Some(actual) = &self.actual {
            let _ = writeln!(out, "**Actual:** {actual}");
        }
        if let Some(session) = &self.session {
            let _ = writeln!(out, "**Session:** {session}");
        }
        if !self.notes.is_empty() {
            out.push('\n');
            for note in &self.notes {
                let _ = writeln!(out, "{note}");
            }
        }
        out.push('\n');
    }
}

/// Parsed `ISSUES.md` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueLedger {
    /// Everything before the "Open Issues" section
    pub preamble: String,

    /// Open issues, oldest first
    pub open: Vec<Issue>,

    /// Raw body of the "Resolved Issues" section
    pub resolved: String,
}

impl IssueLedger {
    /// Empty ledger for a plan.
    pub fn new(plan_ref: &str) -> Self {
        Self {
            preamble: format!("# UAT Issues: {plan_ref}\n\n"),
            open: Vec::new(),
            resolved: format!("{NONE_YET}\n"),
        }
    }

    /// Parse a ledger. Text under an entry that is not a known field is kept
    /// in its notes.
    pub fn parse(content: &str) -> Self {
        let mut preamble = String::new();
        let mut open_body = String::new();
        let mut resolved = String::new();

        let mut section = 0;
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.eq_ignore_ascii_case(OPEN_HEADER) {
                section = 1;
                continue;
            }
            if trimmed.eq_ignore_ascii_case(RESOLVED_HEADER) {
                section = 2;
                continue;
            }
            let target = match section {
                0 => &mut preamble,
                1 => &mut open_body,
                _ => &mut resolved,
            };
            target.push_str(line);
            target.push('\n');
        }

        let resolved = resolved.trim().to_string();
        Self {
            preamble,
            open: parse_entries(&open_body),
            resolved: if resolved.is_empty() { format!("{NONE_YET}\n") } else { resolved + "\n" },
        }
    }

    /// Render the ledger back to markdown.
    pub fn render(&self) -> String {
        let mut out = self.preamble.clone();
        if !out.is_empty() && !out.ends_with("\n\n") {
            out.push('\n');
        }
        out.push_str(OPEN_HEADER);
        out.push_str("\n\n");
        if self.open.is_empty() {
            out.push_str(NONE_YET);
            out.push_str("\n\n");
        }
        for issue in &self.open {
            issue.render(&mut out);
        }
        out.push_str(RESOLVED_HEADER);
        out.push_str("\n\n");
        out.push_str(&self.resolved);
        out
    }

    /// Next free number for `prefix`, counting both sections.
    pub fn next_number(&self, prefix: &str) -> u32 {
        let open_max = self
            .open
            .iter()
            .filter_map(|issue| issue.id.strip_prefix(prefix)?.strip_prefix('-')?.parse::<u32>().ok());
        let resolved_max = ISSUE_ID
            .captures_iter(&self.resolved)
            .filter(|caps| &caps[1] == prefix)
            .filter_map(|caps| caps[2].parse::<u32>().ok());
        open_max.chain(resolved_max).max().map_or(1, |max| max + 1)
    }

    /// Append issues to the open section.
    pub fn append_open(&mut self, issues: impl IntoIterator<Item = Issue>) {
        self.open.extend(issues);
    }

    /// Whether issues from the session stamped `session` are already here,
    /// open or resolved.
    pub fn has_session(&self, session: &str) -> bool {
        self.open.iter().any(|issue| issue.session.as_deref() == Some(session))
            || self.resolved.lines().any(|line| {
                field(line.trim()).is_some_and(|(key, value)| key == "session" && value == session)
            })
    }
}

fn parse_entries(body: &str) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut current: Option<Issue> = None;

    for line in body.lines() {
        let trimmed = line.trim();
        if let Some(caps) = ENTRY_HEADER.captures(trimmed) {
            issues.extend(current.take().map(close_entry));
            current = Some(Issue {
                id: caps[1].to_string(),
                feature: caps[2].trim().to_string(),
                severity: Severity::Major,
                description: String::new(),
                expected: None,
                actual: None,
                discovered: None,
                plan_ref: String::new(),
                session: None,
                notes: Vec::new(),
                resolved: false,
            });
            continue;
        }

        let Some(issue) = current.as_mut() else { continue };
        let Some((key, value)) = field(trimmed) else {
            issue.notes.push(line.trim_end().to_string());
            continue;
        };
        match key.as_str() {
            "discovered" => issue.discovered = NaiveDate::parse_from_str(&value, "%Y-%m-%d").ok(),
            "phase/plan" | "plan" => issue.plan_ref = value,
            "severity" => issue.severity = value.parse().unwrap_or(Severity::Major),
            "feature" => issue.feature = value,
            "description" => issue.description = value,
            "expected" => issue.expected = Some(value),
            "actual" => issue.actual = Some(value),
            "session" => issue.session = Some(value),
            _ => issue.notes.push(line.trim_end().to_string()),
        }
    }
    issues.extend(current.map(close_entry));
    issues
}

/// Drop blank lines around an entry's notes.
fn close_entry(mut issue: Issue) -> Issue {
    while issue.notes.last().is_some_and(|n| n.trim().is_empty()) {
        issue.notes.pop();
    }
    let leading = issue.notes.iter().take_while(|n| n.trim().is_empty()).count();
    issue.notes.drain(..leading);
    issue
}

/// `**Key:** value` or `**Key**: value`, key lowercased.
fn field(line: &str) -> Option<(String, String)> {
    let line = line.strip_prefix("**")?;
    let (key, rest) = line.split_once("**")?;
    let key = key.trim_end_matches(':').trim().to_lowercase();
    let value = rest.trim_start_matches(':').trim().to_string();
    (!key.is_empty()).then_some((key, value))
}

/// Ledger path next to a plan: `02-01-PLAN.md` → `02-01-ISSUES.md`.
pub fn ledger_path_for(plan_path: &Path) -> PathBuf {
    let name = plan_path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    plan_path.with_file_name(format!("{}-ISSUES.md", base_name(name)))
}

/// Writes a finished session's failures to its ledger.
#[derive(Debug, Clone)]
pub struct IssueRecorder {
    prefix: String,
    ledger_path: PathBuf,
}

impl IssueRecorder {
    /// Recorder for a ledger file with an id prefix such as `UAT`.
    pub fn new(prefix: impl Into<String>, ledger_path: impl Into<PathBuf>) -> Self {
        Self { prefix: prefix.into(), ledger_path: ledger_path.into() }
    }

    /// Recorder for the ledger next to a plan file.
    pub fn for_plan(prefix: impl Into<String>, plan_path: &Path) -> Self {
        Self::new(prefix, ledger_path_for(plan_path))
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    /// Issues for a session's fail/partial results, numbered from `start`.
    pub fn issues_for(&self, session: &VerificationSession, start: u32, date: NaiveDate) -> Vec<Issue> {
        let plan_ref = plan_ref(&session.plan);
        session
            .results
            .iter()
            .filter(|result| result.status.needs_severity())
            .zip(start..)
            .map(|(result, number)| {
                let severity = result.severity.unwrap_or(Severity::Major);
                let description = result
                    .description
                    .clone()
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| severity.default_description().to_string());
                Issue {
                    id: format!("{}-{:03}", self.prefix, number),
                    feature: result.feature.clone(),
                    severity,
                    description,
                    expected: None,
                    actual: None,
                    discovered: Some(date),
                    plan_ref: plan_ref.clone(),
                    session: Some(session_stamp(session)),
                    notes: Vec::new(),
                    resolved: false,
                }
            })
            .collect()
    }

    /// Append the session's issues to the ledger.
    ///
    /// A session without failures leaves the ledger untouched, so no empty
    /// ledger appears for fully passing plans. Recording the same session
    /// twice returns the issues already in the ledger and writes nothing.
    pub fn record(&self, session: &VerificationSession) -> io::Result<Vec<Issue>> {
        if !session.results.iter().any(|r| r.status.needs_severity()) {
            return Ok(Vec::new());
        }

        let mut ledger = match fs::read_to_string(&self.ledger_path) {
            Ok(content) => IssueLedger::parse(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => IssueLedger::new(&plan_ref(&session.plan)),
            Err(e) => return Err(e),
        };

        let stamp = session_stamp(session);
        if ledger.has_session(&stamp) {
            tracing::info!(
                ledger = %self.ledger_path.display(),
                session = %session.key,
                "Session already recorded"
            );
            let recorded = ledger.open.into_iter().filter(|i| i.session.as_deref() == Some(stamp.as_str()));
            return Ok(recorded.collect());
        }

        let start = ledger.next_number(&self.prefix);
        let issues = self.issues_for(session, start, Utc::now().date_naive());
        ledger.append_open(issues.clone());

        if let Some(parent) = self.ledger_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.ledger_path.with_extension("md.tmp");
        fs::write(&tmp, ledger.render())?;
        fs::rename(&tmp, &self.ledger_path)?;

        tracing::info!(
            ledger = %self.ledger_path.display(),
            count = issues.len(),
            first = start,
            "Recorded verification issues"
        );
        Ok(issues)
    }
}

/// `uat-02-01 2026-10-16T09:30:00.123456789Z`
fn session_stamp(session: &VerificationSession) -> String {
    format!("{} {}", session.key, session.started_at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn plan_ref(plan: &str) -> String {
    let name = Path::new(plan).file_name().and_then(|n| n.to_str()).unwrap_or(plan);
    base_name(name).to_string()
}
