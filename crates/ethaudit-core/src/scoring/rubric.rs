//! Fixed rubric mapping judge verdicts to numeric scores.

use serde::{Deserialize, Serialize};

use crate::domain::JudgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    FullyCompliant,
    LargelyCompliant,
    PartiallyCompliant,
    MinimallyCompliant,
    NonCompliant,
    InsufficientInformation,
}

/// The declared lookup table. Nothing else converts verdicts to numbers.
pub const RUBRIC: [(Verdict, f64); 6] = [
    (Verdict::FullyCompliant, 1.0),
    (Verdict::LargelyCompliant, 0.75),
    (Verdict::PartiallyCompliant, 0.5),
    (Verdict::MinimallyCompliant, 0.25),
    (Verdict::NonCompliant, 0.0),
    (Verdict::InsufficientInformation, 0.0),
];

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::FullyCompliant => "fully_compliant",
            Verdict::LargelyCompliant => "largely_compliant",
            Verdict::PartiallyCompliant => "partially_compliant",
            Verdict::MinimallyCompliant => "minimally_compliant",
            Verdict::NonCompliant => "non_compliant",
            Verdict::InsufficientInformation => "insufficient_information",
        }
    }

    /// Parse a judge label. Case, spaces and hyphens are normalized.
    pub fn parse(label: &str) -> Result<Verdict, JudgeError> {
        let normalized = label.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        RUBRIC
            .iter()
            .map(|(v, _)| *v)
            .find(|v| v.as_str() == normalized)
            .ok_or_else(|| JudgeError::UnknownVerdict(label.to_string()))
    }

    pub fn score(self) -> f64 {
        RUBRIC
            .iter()
            .find(|(v, _)| *v == self)
            .map(|(_, s)| *s)
            .unwrap_or(0.0)
    }

    /// How much the verdict commits to an answer; 0 when the judge abstained.
    pub fn certainty(self) -> f64 {
        match self {
            Verdict::InsufficientInformation => 0.0,
            _ => 1.0,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
