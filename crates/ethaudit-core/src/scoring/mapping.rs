//! Evidence-to-criterion mapping.
//!
//! For each criterion the supporting documents are those whose topics include
//! the criterion's category. The judgment score combines:
//!
//! - commitment: share of supporting documents with an explicit commitment marker
//! - coverage: `1 - Π(1 - reliability)` over supporting documents
//! - rubric: the judge's verdict through [`RUBRIC`](super::rubric::RUBRIC)
//!
//! as `0.35 * commitment + 0.25 * coverage + 0.40 * rubric`. Confidence is
//! `0.5 * coverage + 0.3 * min(n / 3, 1) + 0.2 * certainty`.

use std::collections::BTreeSet;

use futures::future::join_all;
use tracing::warn;

use super::keywords::has_commitment;
use super::rubric::Verdict;
use crate::collaborators::Judge;
use crate::domain::{Criterion, CriterionEvaluation, Document, EvidenceSet};
use crate::quality::clamped_reliability;

const COMMITMENT_WEIGHT: f64 = 0.35;
const COVERAGE_WEIGHT: f64 = 0.25;
const RUBRIC_WEIGHT: f64 = 0.40;

const CONF_COVERAGE: f64 = 0.5;
const CONF_VOLUME: f64 = 0.3;
const CONF_CERTAINTY: f64 = 0.2;
/// Supporting documents at which the volume term saturates.
const VOLUME_SATURATION: f64 = 3.0;

/// A criterion evaluation plus any soft failure hit while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapped {
    pub evaluation: CriterionEvaluation,
    pub warning: Option<String>,
}

pub fn supporting_documents<'a>(criterion: &Criterion, evidence: &'a EvidenceSet) -> Vec<&'a Document> {
    evidence
        .iter()
        .filter(|d| d.effective_topics().contains(&criterion.category))
        .collect()
}

pub fn reliability_coverage(docs: &[&Document]) -> f64 {
    1.0 - docs
        .iter()
        .map(|d| 1.0 - clamped_reliability(d.reliability_score))
        .product::<f64>()
}

pub fn commitment_share(docs: &[&Document]) -> f64 {
    if docs.is_empty() {
        return 0.0;
    }
    let committed = docs
        .iter()
        .filter(|d| has_commitment(&d.title) || has_commitment(&d.excerpt))
        .count();
    committed as f64 / docs.len() as f64
}

pub fn judgment_score(commitment: f64, coverage: f64, verdict: Verdict) -> f64 {
    (COMMITMENT_WEIGHT * commitment + COVERAGE_WEIGHT * coverage + RUBRIC_WEIGHT * verdict.score())
        .clamp(0.0, 1.0)
}

pub fn confidence(coverage: f64, supporting: usize, verdict: Verdict) -> f64 {
    (CONF_COVERAGE * coverage
        + CONF_VOLUME * (supporting as f64 / VOLUME_SATURATION).min(1.0)
        + CONF_CERTAINTY * verdict.certainty())
    .clamp(0.0, 1.0)
}

fn evidence_text(docs: &[&Document]) -> String {
    docs.iter()
        .map(|d| {
            format!(
                "[{}] {} ({}, reliability {:.2}): {}",
                d.source_id, d.title, d.url_or_ref, d.reliability_score, d.excerpt
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Evaluate one criterion. Judge failures degrade to an
/// `insufficient_information` verdict and a warning.
pub async fn evaluate_criterion(
    criterion: &Criterion,
    evidence: &EvidenceSet,
    judge: &dyn Judge,
    max_evidence: usize,
) -> Mapped {
    let supporting = supporting_documents(criterion, evidence);
    if supporting.is_empty() {
        return Mapped {
            evaluation: CriterionEvaluation {
                criterion_id: criterion.criterion_id.clone(),
                category: criterion.category,
                weight: criterion.weight,
                evidence_refs: BTreeSet::new(),
                judgment_score: 0.0,
                confidence: 0.0,
                verdict: Verdict::InsufficientInformation,
                rationale: "No supporting evidence was collected for this criterion.".to_string(),
            },
            warning: None,
        };
    }

    let mut selected = supporting.clone();
    selected.sort_by(|a, b| {
        b.reliability_score
            .total_cmp(&a.reliability_score)
            .then_with(|| a.source_id.cmp(&b.source_id))
    });
    selected.truncate(max_evidence);

    let (verdict, rationale, warning) =
        match judge.judge(&evidence_text(&selected), &criterion.text).await {
            Ok(output) => match Verdict::parse(&output.verdict_label) {
                Ok(verdict) => (verdict, output.rationale, None),
                Err(e) => (
                    Verdict::InsufficientInformation,
                    output.rationale,
                    Some(format!("{}: {e}", criterion.criterion_id)),
                ),
            },
            Err(e) => (
                Verdict::InsufficientInformation,
                "The qualitative judgment was unavailable.".to_string(),
                Some(format!("{}: {e}", criterion.criterion_id)),
            ),
        };
    if let Some(w) = &warning {
        warn!(criterion_id = %criterion.criterion_id, warning = %w, "judge degraded");
    }

    let coverage = reliability_coverage(&supporting);
    let commitment = commitment_share(&supporting);
    let evidence_refs: BTreeSet<String> = selected.iter().map(|d| d.source_id.clone()).collect();
    let cites = evidence_refs.iter().cloned().collect::<Vec<_>>().join(", ");

    Mapped {
        evaluation: CriterionEvaluation {
            criterion_id: criterion.criterion_id.clone(),
            category: criterion.category,
            weight: criterion.weight,
            judgment_score: judgment_score(commitment, coverage, verdict),
            confidence: confidence(coverage, supporting.len(), verdict),
            verdict,
            rationale: format!("{} [sources: {cites}]", rationale.trim()),
            evidence_refs,
        },
        warning,
    }
}

/// Evaluate every criterion, preserving criterion order.
pub async fn evaluate_all(
    criteria: &[Criterion],
    evidence: &EvidenceSet,
    judge: &dyn Judge,
    max_evidence: usize,
) -> Vec<Mapped> {
    join_all(
        criteria
            .iter()
            .map(|c| evaluate_criterion(c, evidence, judge, max_evidence)),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, SourceType};
    use crate::fakes::{FailingJudge, FixedJudge};

    fn criterion(category: Category) -> Criterion {
        Criterion {
            criterion_id: format!("{}-01", category.as_str()),
            category,
            text: "Providers shall disclose model limitations".into(),
            weight: 1.0,
            source_clause_refs: Vec::new(),
        }
    }

    fn evidence() -> EvidenceSet {
        let mut set = EvidenceSet::new();
        set.merge([
            Document::new("d1", SourceType::Web, "https://acme.example/trust", 0.8)
                .with_title("Trust center")
                .with_excerpt("We publish a model card for every release.")
                .with_topics([Category::Transparency]),
            Document::new("d2", SourceType::Specialized, "https://journal.example/p", 0.5)
                .with_excerpt("Independent study of the product.")
                .with_topics([Category::Transparency]),
            Document::new("d3", SourceType::Web, "https://news.example/x", 0.9)
                .with_topics([Category::Robustness]),
        ]);
        set
    }

    #[test]
    fn coverage_combines_reliabilities() {
        let set = evidence();
        let docs = supporting_documents(&criterion(Category::Transparency), &set);
        assert_eq!(docs.len(), 2);
        assert!((reliability_coverage(&docs) - 0.9).abs() < 1e-9);
        assert!((commitment_share(&docs) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn non_finite_reliability_adds_no_coverage() {
        let nan = Document::new("n", SourceType::Web, "https://n.example", f64::NAN);
        let over = Document::new("o", SourceType::Web, "https://o.example", 1.5);
        assert_eq!(reliability_coverage(&[&nan]), 0.0);
        assert_eq!(reliability_coverage(&[&over]), 1.0);
    }

    #[tokio::test]
    async fn judgment_combines_three_terms() {
        let set = evidence();
        let judge = FixedJudge::new("largely_compliant");
        let mapped =
            evaluate_criterion(&criterion(Category::Transparency), &set, &judge, 8).await;
        let eval = mapped.evaluation;
        // 0.35 * 0.5 + 0.25 * 0.9 + 0.40 * 0.75
        assert!((eval.judgment_score - 0.7).abs() < 1e-9);
        // 0.5 * 0.9 + 0.3 * (2 / 3) + 0.2 * 1
        assert!((eval.confidence - 0.85).abs() < 1e-9);
        assert_eq!(eval.verdict, Verdict::LargelyCompliant);
        assert!(eval.evidence_refs.contains("d1"));
        assert!(eval.rationale.contains("d1"));
        assert!(mapped.warning.is_none());
    }

    #[tokio::test]
    async fn no_evidence_scores_zero_without_judging() {
        let set = evidence();
        let judge = FixedJudge::new("fully_compliant");
        let mapped =
            evaluate_criterion(&criterion(Category::HumanOversight), &set, &judge, 8).await;
        assert_eq!(mapped.evaluation.judgment_score, 0.0);
        assert_eq!(mapped.evaluation.confidence, 0.0);
        assert!(mapped.evaluation.evidence_refs.is_empty());
        assert_eq!(judge.calls(), 0);
    }

    #[tokio::test]
    async fn judge_failure_degrades_softly() {
        let set = evidence();
        let mapped =
            evaluate_criterion(&criterion(Category::Transparency), &set, &FailingJudge, 8).await;
        assert_eq!(mapped.evaluation.verdict, Verdict::InsufficientInformation);
        assert!(mapped.warning.is_some());
        // rubric contributes nothing; commitment and coverage still count
        assert!((mapped.evaluation.judgment_score - (0.175 + 0.225)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_label_is_a_warning() {
        let set = evidence();
        let judge = FixedJudge::new("looks fine");
        let mapped =
            evaluate_criterion(&criterion(Category::Transparency), &set, &judge, 8).await;
        assert_eq!(mapped.evaluation.verdict, Verdict::InsufficientInformation);
        assert!(mapped.warning.unwrap().contains("looks fine"));
    }

    #[tokio::test]
    async fn evidence_passed_to_judge_is_capped_by_reliability() {
        let set = evidence();
        let judge = FixedJudge::new("partially_compliant");
        let mapped =
            evaluate_criterion(&criterion(Category::Transparency), &set, &judge, 1).await;
        let refs: Vec<&str> = mapped.evaluation.evidence_refs.iter().map(String::as_str).collect();
        assert_eq!(refs, vec!["d1"]);
    }
}
