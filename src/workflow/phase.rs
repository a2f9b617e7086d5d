//! Phase, plan and milestone types.
//!
//! Phase numbers are decimal so that inserted phases (`2.1`) sort between
//! their neighbours. Ordering is always numeric, never lexical.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A decimal phase number such as `3` or `2.1`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseNumber(f64);

impl PhaseNumber {
    /// Create a phase number from a float.
    ///
    /// Non-finite and negative values are clamped to zero.
    pub fn new(value: f64) -> Self {
        if value.is_finite() && value >= 0.0 {
            Self(value)
        } else {
            Self(0.0)
        }
    }

    /// The numeric value.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Whether this is an inserted (fractional) phase.
    pub fn is_inserted(self) -> bool {
        self.0.fract() != 0.0
    }

    /// Zero-padded directory prefix, e.g. `02` or `02.1`.
    pub fn dir_prefix(self) -> String {
        let whole = self.0.trunc() as u64;
        if self.is_inserted() {
            let text = self.to_string();
            let fraction = text.split_once('.').map(|(_, f)| f).unwrap_or("0");
            format!("{whole:02}.{fraction}")
        } else {
            format!("{whole:02}")
        }
    }
}

impl PartialEq for PhaseNumber {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PhaseNumber {}

impl PartialOrd for PhaseNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PhaseNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<u32> for PhaseNumber {
    fn from(value: u32) -> Self {
        Self(f64::from(value))
    }
}

impl FromStr for PhaseNumber {
    type Err = std::num::ParseFloatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<f64>().map(Self::new)
    }
}

impl fmt::Display for PhaseNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_inserted() {
            // Shortest representation that round-trips, so 2.1 prints as "2.1".
            write!(f, "{}", self.0)
        } else {
            write!(f, "{}", self.0.trunc() as u64)
        }
    }
}

/// A phase in the roadmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    /// Phase number
    pub number: PhaseNumber,

    /// Phase name
    pub name: String,

    /// One-line goal (empty when the roadmap omits it)
    pub goal: String,

    /// Checked off in the roadmap
    pub complete: bool,

    /// Phase this one builds on
    pub depends_on: Option<PhaseNumber>,
}

impl Phase {
    /// Create an incomplete phase with no dependency.
    pub fn new(number: PhaseNumber, name: impl Into<String>, goal: impl Into<String>) -> Self {
        Self { number, name: name.into(), goal: goal.into(), complete: false, depends_on: None }
    }
}

/// A plan file inside a phase directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Owning phase
    pub phase: PhaseNumber,

    /// Plan index within the phase (1-based)
    pub index: u32,

    /// File name, e.g. `02-01-PLAN.md`
    pub file: String,

    /// A matching summary exists
    pub executed: bool,
}

/// Milestone delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MilestoneStatus {
    InProgress,
    Complete,
}

/// A named group of consecutive phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Version label without the leading `v`, e.g. `1.0`
    pub number: String,

    /// Milestone name
    pub name: String,

    /// First phase covered
    pub first_phase: PhaseNumber,

    /// Last phase covered
    pub last_phase: PhaseNumber,

    /// Status
    pub status: MilestoneStatus,
}

impl Milestone {
    /// Whether `phase` falls inside this milestone's range.
    pub fn covers(&self, phase: PhaseNumber) -> bool {
        phase >= self.first_phase && phase <= self.last_phase
    }
}

/// Sort phases numerically and fill in default dependencies.
///
/// Phase 1 (or whichever phase sorts first) never depends on anything. Every
/// later phase without an explicit dependency depends on its predecessor.
pub fn normalize_phases(phases: &mut Vec<Phase>) {
    phases.sort_by(|a, b| a.number.cmp(&b.number));
    phases.dedup_by(|later, earlier| later.number == earlier.number);

    let mut previous: Option<PhaseNumber> = None;
    for phase in phases.iter_mut() {
        match previous {
            None => phase.depends_on = None,
            Some(prev) => {
                if phase.depends_on.is_none() {
                    phase.depends_on = Some(prev);
                }
            }
        }
        previous = Some(phase.number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(s: &str) -> PhaseNumber {
        s.parse().unwrap()
    }

    #[test]
    fn test_numeric_ordering() {
        let mut numbers = vec![num("1"), num("2"), num("1.5"), num("10")];
        numbers.sort();
        let shown: Vec<String> = numbers.iter().map(ToString::to_string).collect();
        assert_eq!(shown, vec!["1", "1.5", "2", "10"]);
    }

    #[test]
    fn test_display_and_prefix() {
        assert_eq!(num("3").to_string(), "3");
        assert_eq!(num("2.1").to_string(), "2.1");
        assert_eq!(num("3").dir_prefix(), "03");
        assert_eq!(num("2.1").dir_prefix(), "02.1");
        assert!(num("2.1").is_inserted());
        assert!(!num("2").is_inserted());
    }

    #[test]
    fn test_normalize_default_dependencies() {
        let mut phases = vec![
            Phase::new(num("2"), "Core", ""),
            Phase::new(num("1"), "Foundation", ""),
            Phase::new(num("1.5"), "Hotfix", ""),
        ];
        phases[0].depends_on = Some(num("1"));
        normalize_phases(&mut phases);

        assert_eq!(phases[0].number, num("1"));
        assert_eq!(phases[0].depends_on, None);
        assert_eq!(phases[1].depends_on, Some(num("1")));
        // Explicit dependency is kept
        assert_eq!(phases[2].depends_on, Some(num("1")));
    }

    #[test]
    fn test_milestone_covers() {
        let milestone = Milestone {
            number: "1.0".to_string(),
            name: "MVP".to_string(),
            first_phase: num("1"),
            last_phase: num("4"),
            status: MilestoneStatus::InProgress,
        };
        assert!(milestone.covers(num("2.1")));
        assert!(!milestone.covers(num("5")));
    }
}
