//! Parsing of raw operator messages into verification events.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::session::{Severity, TestStatus};

/// `[uat] <status> [index]`, e.g. `pass`, `uat:fail 2`, `skip: 3`.
static RESULT_EVENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:uat[:\s]+)?(pass|passed|fail|failed|partial|skip|skipped)(?:[:\s]+(\d+))?$")
        .unwrap()
});

/// `[uat] severity <level> [description]` or `uat <level> [description]`,
/// e.g. `severity: major login hangs`.
static SEVERITY_EVENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:(?:uat[:\s]+)?severity[:\s]+|uat[:\s]+)(blocker|major|minor|cosmetic)(?:[:\s]+(.+))?$",
    )
    .unwrap()
});

/// A bare level with nothing after it.
static BARE_SEVERITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(blocker|major|minor|cosmetic)$").unwrap());

/// An operator input for a verification session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VerificationEvent {
    /// Result for a test. `index` is 0-based; `None` means the current test.
    Result { index: Option<usize>, status: TestStatus },

    /// Severity for the pending fail/partial result.
    Severity { severity: Severity, description: Option<String> },
}

impl VerificationEvent {
    /// Parse a raw message. Messages that are not verification events yield
    /// `None` and should be ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }

        if let Some(caps) = RESULT_EVENT.captures(text) {
            let status = caps[1].parse::<TestStatus>().ok()?;
            let index = match caps.get(2) {
                Some(m) => Some(m.as_str().parse::<usize>().ok()?),
                None => None,
            };
            return Some(Self::Result { index, status });
        }

        if let Some(caps) = SEVERITY_EVENT.captures(text).or_else(|| BARE_SEVERITY.captures(text)) {
            let severity = caps[1].parse::<Severity>().ok()?;
            let description = caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .filter(|d| !d.is_empty());
            return Some(Self::Severity { severity, description });
        }

        None
    }
}
