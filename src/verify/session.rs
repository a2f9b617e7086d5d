//! Verification session record and transitions.
//!
//! A session walks an operator through a list of test items, one event at a
//! time. The record is plain data so it can be persisted between events;
//! transitions validate first and only then mutate, so a rejected event
//! never changes the record.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::IllegalEvent;
use crate::workflow::base_name;

/// Outcome of a single test item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
    Partial,
    Skip,
}

impl TestStatus {
    /// Fail and partial results need a severity before they are recorded.
    pub fn needs_severity(self) -> bool {
        matches!(self, Self::Fail | Self::Partial)
    }
}

impl FromStr for TestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pass" | "passed" | "ok" => Ok(Self::Pass),
            "fail" | "failed" => Ok(Self::Fail),
            "partial" => Ok(Self::Partial),
            "skip" | "skipped" => Ok(Self::Skip),
            other => Err(format!("unknown test status '{other}'")),
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Partial => "partial",
            Self::Skip => "skip",
        };
        f.write_str(s)
    }
}

/// How bad a failed test is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Blocker,
    Major,
    Minor,
    Cosmetic,
}

impl Severity {
    /// Stock description used when the operator gives none.
    pub fn default_description(self) -> &'static str {
        match self {
            Self::Blocker => "Feature is unusable and blocks further testing",
            Self::Major => "Feature does not work as expected",
            Self::Minor => "Feature works but has minor problems",
            Self::Cosmetic => "Visual or wording issue only",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "blocker" => Ok(Self::Blocker),
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "cosmetic" => Ok(Self::Cosmetic),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Blocker => "Blocker",
            Self::Major => "Major",
            Self::Minor => "Minor",
            Self::Cosmetic => "Cosmetic",
        };
        f.write_str(s)
    }
}

/// Recorded outcome of one test item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// The test item text
    pub feature: String,

    /// Outcome
    pub status: TestStatus,

    /// Present only for fail and partial results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,

    /// What went wrong
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Deterministic identifier of a verification session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Key from a plan's phase and plan numbers: `uat-02-01`.
    pub fn for_plan(phase: &str, plan: &str) -> Self {
        Self(format!("uat-{}-{}", sanitize(phase), sanitize(plan)))
    }

    /// Key from a stable hash of the plan path: `uat-3f2a…`.
    pub fn for_path(path: &Path) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(path.to_string_lossy().as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Self(format!("uat-{}", &digest[..16]))
    }

    /// Key for a plan file, preferring its `NN-MM` numbers over a path hash.
    ///
    /// Fix plans keep their `FIX[-k]` segment, so `02-01-FIX-PLAN.md` is
    /// `uat-02-01-fix` and never shares a session with `02-01-PLAN.md`.
    pub fn for_plan_file(path: &Path) -> Self {
        let numbers = path.file_name().and_then(|n| n.to_str()).and_then(|name| {
            let mut parts = base_name(name).split('-');
            let phase = parts.next()?;
            let plan = parts.next()?;
            let numeric = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || c == '.');
            let rest = parts.collect::<Vec<_>>().join("-");
            (numeric(phase) && numeric(plan)).then(|| (phase.to_string(), plan.to_string(), rest))
        });

        match numbers {
            Some((phase, plan, rest)) if rest.is_empty() => Self::for_plan(&phase, &plan),
            Some((phase, plan, rest)) => {
                let Self(base) = Self::for_plan(&phase, &plan);
                Self(format!("{base}-{}", sanitize(&rest.to_lowercase())))
            }
            None => Self::for_path(path),
        }
    }

    /// Wrap an already-derived key.
    ///
    /// Characters outside `[A-Za-z0-9._-]` are replaced so the key is always
    /// usable as a file name.
    pub fn from_raw(raw: &str) -> Self {
        Self(raw.chars().map(|c| if is_key_char(c) { c } else { '_' }).collect())
    }

    /// The key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')
}

fn sanitize(part: &str) -> String {
    part.trim().chars().filter(|c| is_key_char(*c)).collect()
}

/// Where a session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for the result of test `index`
    AwaitingResult { index: usize },

    /// Test `index` failed or was partial; waiting for its severity
    AwaitingSeverity { index: usize, status: TestStatus },

    /// Every test has a result
    Complete,
}

/// Returned after a result event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultOutcome {
    /// A severity event must follow
    pub needs_severity: bool,

    /// Every test now has a result
    pub completed: bool,
}

/// Returned after a severity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityOutcome {
    /// Every test now has a result
    pub completed: bool,
}

/// Persisted verification session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSession {
    /// Session key
    pub key: SessionKey,

    /// Plan under test (file name or path)
    pub plan: String,

    /// Ordered test items
    pub test_items: Vec<String>,

    /// Results so far (append-only)
    pub results: Vec<TestResult>,

    /// Index of the test awaiting a result
    pub current_index: usize,

    /// Status of the in-flight fail/partial result
    #[serde(default)]
    pub pending_status: Option<TestStatus>,

    /// When the session started
    pub started_at: DateTime<Utc>,
}

impl VerificationSession {
    /// Create a session positioned at the first test item.
    pub fn new(key: SessionKey, plan: impl Into<String>, test_items: Vec<String>) -> Self {
        Self {
            key,
            plan: plan.into(),
            test_items,
            results: Vec::new(),
            current_index: 0,
            pending_status: None,
            started_at: Utc::now(),
        }
    }

    /// Whether a severity event is expected next.
    pub fn pending_severity(&self) -> bool {
        self.pending_status.is_some()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        if let Some(status) = self.pending_status {
            SessionState::AwaitingSeverity { index: self.current_index, status }
        } else if self.is_complete() {
            SessionState::Complete
        } else {
            SessionState::AwaitingResult { index: self.current_index }
        }
    }

    /// Whether every test has a result.
    pub fn is_complete(&self) -> bool {
        self.pending_status.is_none() && self.current_index >= self.test_items.len()
    }

    /// The test item awaiting input, if any.
    pub fn current_item(&self) -> Option<&str> {
        if self.is_complete() {
            None
        } else {
            self.test_items.get(self.current_index).map(String::as_str)
        }
    }

    /// Number of tests still without a result.
    pub fn remaining(&self) -> usize {
        self.test_items.len().saturating_sub(self.results.len())
    }

    /// Apply a result for test `index`.
    ///
    /// Pass and skip are recorded immediately. Fail and partial are held
    /// until a severity arrives.
    pub fn apply_result(
        &mut self,
        index: usize,
        status: TestStatus,
    ) -> Result<ResultOutcome, IllegalEvent> {
        match self.state() {
            SessionState::Complete => return Err(IllegalEvent::SessionComplete),
            SessionState::AwaitingSeverity { index, .. } => {
                return Err(IllegalEvent::AwaitingSeverity { index })
            }
            SessionState::AwaitingResult { index: expected } if expected != index => {
                return Err(IllegalEvent::IndexMismatch { expected, received: index })
            }
            SessionState::AwaitingResult { .. } => {}
        }

        if status.needs_severity() {
            self.pending_status = Some(status);
            return Ok(ResultOutcome { needs_severity: true, completed: false });
        }

        self.push_result(TestResult {
            feature: self.test_items[index].clone(),
            status,
            severity: None,
            description: None,
        });
        Ok(ResultOutcome { needs_severity: false, completed: self.is_complete() })
    }

    /// Apply the severity for the pending fail/partial result.
    pub fn apply_severity(
        &mut self,
        severity: Severity,
        description: Option<String>,
    ) -> Result<SeverityOutcome, IllegalEvent> {
        let status = self.pending_status.ok_or(IllegalEvent::NoPendingSeverity)?;
        let feature = self
            .test_items
            .get(self.current_index)
            .cloned()
            .ok_or(IllegalEvent::SessionComplete)?;

        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| severity.default_description().to_string());

        self.pending_status = None;
        self.push_result(TestResult {
            feature,
            status,
            severity: Some(severity),
            description: Some(description),
        });
        Ok(SeverityOutcome { completed: self.is_complete() })
    }

    fn push_result(&mut self, result: TestResult) {
        self.results.push(result);
        self.current_index += 1;
        debug_assert_eq!(self.current_index, self.results.len());
    }

    /// Tally of results so far.
    pub fn summary(&self) -> VerificationSummary {
        VerificationSummary::from_results(&self.results)
    }
}

/// Pass/fail/partial/skip counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub passed: usize,
    pub failed: usize,
    pub partial: usize,
    pub skipped: usize,

    /// Fail and partial results grouped by severity
    pub by_severity: BTreeMap<Severity, usize>,
}

impl VerificationSummary {
    /// Tally a list of results.
    pub fn from_results(results: &[TestResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result.status {
                TestStatus::Pass => summary.passed += 1,
                TestStatus::Fail => summary.failed += 1,
                TestStatus::Partial => summary.partial += 1,
                TestStatus::Skip => summary.skipped += 1,
            }
            if result.status.needs_severity() {
                let severity = result.severity.unwrap_or(Severity::Major);
                *summary.by_severity.entry(severity).or_insert(0) += 1;
            }
        }
        summary
    }

    /// Total number of results.
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.partial + self.skipped
    }

    /// Number of results that become issues.
    pub fn issue_count(&self) -> usize {
        self.failed + self.partial
    }
}

impl fmt::Display for VerificationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} partial, {} skipped",
            self.passed, self.failed, self.partial, self.skipped
        )
    }
}
