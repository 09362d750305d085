//! Sufficiency gate.
//!
//! Evaluates a [`RunState`] against a set of [`SufficiencyRule`]s and produces
//! a [`SufficiencyVerdict`]. The gate runs after analysis and again after
//! evaluation; the retry controller turns the verdict into a routing decision.

use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::domain::RunState;

/// Where in the run the gate is being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePoint {
    AfterAnalysis,
    AfterEvaluation,
}

impl GatePoint {
    pub fn as_str(self) -> &'static str {
        match self {
            GatePoint::AfterAnalysis => "after_analysis",
            GatePoint::AfterEvaluation => "after_evaluation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SufficiencyRule {
    /// `is_data_sufficient` must hold.
    DataQuality,
    /// `is_analysis_sufficient` must hold.
    AnalysisCoverage,
    /// Mean criterion confidence must meet `thresholds.evaluation_confidence`.
    EvaluationConfidence,
}

impl SufficiencyRule {
    /// Rules checked at a gate point.
    pub fn for_point(point: GatePoint, recheck_after_evaluation: bool) -> Vec<SufficiencyRule> {
        match point {
            GatePoint::AfterAnalysis => {
                vec![SufficiencyRule::DataQuality, SufficiencyRule::AnalysisCoverage]
            }
            GatePoint::AfterEvaluation if recheck_after_evaluation => vec![
                SufficiencyRule::DataQuality,
                SufficiencyRule::AnalysisCoverage,
                SufficiencyRule::EvaluationConfidence,
            ],
            GatePoint::AfterEvaluation => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: SufficiencyRule,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SufficiencyVerdict {
    pub point: GatePoint,
    pub violations: Vec<Violation>,
}

impl SufficiencyVerdict {
    /// Whether every rule held.
    pub fn sufficient(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.reason.clone()).collect()
    }
}

pub fn evaluate_gate(
    point: GatePoint,
    run: &RunState,
    thresholds: &Thresholds,
    recheck_after_evaluation: bool,
) -> SufficiencyVerdict {
    let violations = SufficiencyRule::for_point(point, recheck_after_evaluation)
        .into_iter()
        .filter_map(|rule| check_rule(rule, run, thresholds))
        .collect();
    SufficiencyVerdict { point, violations }
}

fn check_rule(rule: SufficiencyRule, run: &RunState, thresholds: &Thresholds) -> Option<Violation> {
    match rule {
        SufficiencyRule::DataQuality => {
            if run.is_data_sufficient {
                None
            } else {
                Some(Violation {
                    rule,
                    reason: format!(
                        "quality score {:.2} < required {:.2}",
                        run.quality_score.unwrap_or(0.0),
                        thresholds.quality
                    ),
                })
            }
        }
        SufficiencyRule::AnalysisCoverage => {
            if run.is_analysis_sufficient {
                None
            } else {
                Some(Violation {
                    rule,
                    reason: format!(
                        "analysis score {:.2} < required {:.2}",
                        run.analysis_score, thresholds.analysis
                    ),
                })
            }
        }
        SufficiencyRule::EvaluationConfidence => {
            let confidence = run
                .final_score
                .as_ref()
                .map(|s| s.overall_confidence)
                .unwrap_or(0.0);
            if confidence >= thresholds.evaluation_confidence {
                None
            } else {
                Some(Violation {
                    rule,
                    reason: format!(
                        "evaluation confidence {:.2} < required {:.2}",
                        confidence, thresholds.evaluation_confidence
                    ),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(data: bool, analysis: bool) -> RunState {
        let mut run = RunState::new("Acme", "medical");
        run.is_data_sufficient = data;
        run.quality_score = Some(if data { 0.8 } else { 0.3 });
        run.is_analysis_sufficient = analysis;
        run.analysis_score = if analysis { 0.8 } else { 0.2 };
        run
    }

    #[test]
    fn sufficient_requires_both_flags() {
        let t = Thresholds::default();
        assert!(evaluate_gate(GatePoint::AfterAnalysis, &run(true, true), &t, true).sufficient());

        let verdict = evaluate_gate(GatePoint::AfterAnalysis, &run(false, true), &t, true);
        assert!(!verdict.sufficient());
        assert_eq!(verdict.violations[0].rule, SufficiencyRule::DataQuality);
        assert!(verdict.violations[0].reason.contains("0.30"));

        let verdict = evaluate_gate(GatePoint::AfterAnalysis, &run(true, false), &t, true);
        assert_eq!(verdict.violations[0].rule, SufficiencyRule::AnalysisCoverage);
    }

    #[test]
    fn after_evaluation_checks_confidence() {
        let t = Thresholds::default();
        let verdict = evaluate_gate(GatePoint::AfterEvaluation, &run(true, true), &t, true);
        assert_eq!(verdict.violations.len(), 1);
        assert_eq!(verdict.violations[0].rule, SufficiencyRule::EvaluationConfidence);
    }

    #[test]
    fn recheck_can_be_disabled() {
        let t = Thresholds::default();
        let verdict = evaluate_gate(GatePoint::AfterEvaluation, &run(false, false), &t, false);
        assert!(verdict.sufficient());
    }
}
