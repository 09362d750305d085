use async_trait::async_trait;

use crate::collaborators::{Judge, JudgeOutput};
use crate::domain::JudgeError;
use crate::scoring::keywords::has_commitment;
use crate::scoring::Verdict;

/// Deterministic judge driven by the share of evidence lines that carry an
/// explicit commitment marker.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleJudge;

impl RuleJudge {
    pub fn new() -> Self {
        Self
    }

    fn verdict_for(committed: usize, total: usize) -> Verdict {
        if total == 0 {
            return Verdict::InsufficientInformation;
        }
        let share = committed as f64 / total as f64;
        match share {
            s if s >= 0.75 => Verdict::FullyCompliant,
            s if s >= 0.5 => Verdict::LargelyCompliant,
            s if s >= 0.25 => Verdict::PartiallyCompliant,
            s if s > 0.0 => Verdict::MinimallyCompliant,
            _ => Verdict::NonCompliant,
        }
    }
}

#[async_trait]
impl Judge for RuleJudge {
    async fn judge(
        &self,
        evidence_text: &str,
        _criterion_text: &str,
    ) -> Result<JudgeOutput, JudgeError> {
        let lines: Vec<&str> = evidence_text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .collect();
        let committed = lines.iter().filter(|l| has_commitment(l)).count();
        let verdict = Self::verdict_for(committed, lines.len());
        Ok(JudgeOutput {
            verdict_label: verdict.as_str().to_string(),
            rationale: format!(
                "{committed} of {} evidence items state an explicit commitment",
                lines.len()
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_evidence_abstains() {
        let out = RuleJudge::new().judge("", "transparency").await.unwrap();
        assert_eq!(out.verdict_label, "insufficient_information");
    }

    #[tokio::test]
    async fn commitment_share_sets_verdict() {
        let evidence = "[d1] We commit to publishing model cards\n\
                        [d2] Press coverage of the product launch\n\
                        [d3] The audit was audited by an external firm\n\
                        [d4] Blog post about hiring";
        let out = RuleJudge::new().judge(evidence, "transparency").await.unwrap();
        assert_eq!(out.verdict_label, "largely_compliant");
        assert!(out.rationale.starts_with("2 of 4"));
    }

    #[tokio::test]
    async fn no_commitments_is_non_compliant() {
        let out = RuleJudge::new()
            .judge("[d1] Product announcement", "oversight")
            .await
            .unwrap();
        assert_eq!(Verdict::parse(&out.verdict_label).unwrap(), Verdict::NonCompliant);
    }
}
