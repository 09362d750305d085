//! Final aggregate score, grade and risk level.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::category::Category;
use super::criterion::CriterionEvaluation;

/// Letter grade from fixed cutoffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// A ≥ 85, B ≥ 70, C ≥ 55, D ≥ 40, F below.
    pub fn from_score(ethics_score: u8) -> Self {
        match ethics_score {
            85..=u8::MAX => Grade::A,
            70..=84 => Grade::B,
            55..=69 => Grade::C,
            40..=54 => Grade::D,
            _ => Grade::F,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Risk follows the grade, raised one level when critical issues pile up.
    pub fn derive(grade: Grade, critical_issue_count: usize) -> Self {
        let base = match grade {
            Grade::A | Grade::B if critical_issue_count == 0 => RiskLevel::Low,
            Grade::A | Grade::B => RiskLevel::Medium,
            Grade::C => RiskLevel::Medium,
            Grade::D => RiskLevel::High,
            Grade::F => RiskLevel::Critical,
        };
        if critical_issue_count > 3 && base < RiskLevel::Critical {
            base.raised()
        } else {
            base
        }
    }

    fn raised(self) -> Self {
        match self {
            RiskLevel::Low => RiskLevel::Medium,
            RiskLevel::Medium => RiskLevel::High,
            RiskLevel::High | RiskLevel::Critical => RiskLevel::Critical,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate result of the evaluation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalScore {
    /// In `[0, 100]`.
    pub ethics_score: u8,
    pub category_scores: BTreeMap<Category, f64>,
    pub grade: Grade,
    /// Worst first.
    pub critical_issues: Vec<CriterionEvaluation>,
    pub overall_confidence: f64,
    pub confidence_by_category: BTreeMap<Category, f64>,
    pub risk_level: RiskLevel,
}
