//! Weighted roll-up of criterion evaluations into a [`FinalScore`].

use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::domain::{
    AggregationError, Category, CriteriaSet, CriterionEvaluation, FinalScore, Grade, RiskLevel,
};

/// Whether an evaluation is surfaced as a critical issue.
pub fn is_critical(eval: &CriterionEvaluation, config: &EngineConfig) -> bool {
    eval.judgment_score < config.risk_floor(eval.category) || eval.confidence < config.confidence_floor
}

/// Worst first: ascending judgment, then descending weight, then id.
pub fn order_critical(issues: &mut [CriterionEvaluation]) {
    issues.sort_by(|a, b| {
        a.judgment_score
            .total_cmp(&b.judgment_score)
            .then_with(|| b.weight.total_cmp(&a.weight))
            .then_with(|| a.criterion_id.cmp(&b.criterion_id))
    });
}

fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Aggregate evaluations against their criteria set.
///
/// Every category of the taxonomy gets a score; categories without criteria
/// score 0. `ethics_score` is the mean category score scaled to 0..=100.
pub fn aggregate(
    criteria: &CriteriaSet,
    evaluations: &[CriterionEvaluation],
    config: &EngineConfig,
) -> Result<FinalScore, AggregationError> {
    criteria.validate_weights()?;

    let mut category_scores: BTreeMap<Category, f64> =
        Category::ALL.into_iter().map(|c| (c, 0.0)).collect();
    let mut confidences: BTreeMap<Category, Vec<f64>> = BTreeMap::new();

    for eval in evaluations {
        let criterion =
            criteria
                .get(&eval.criterion_id)
                .ok_or_else(|| AggregationError::UnknownCriterion {
                    criterion_id: eval.criterion_id.clone(),
                })?;
        if !eval.judgment_score.is_finite() || !eval.confidence.is_finite() {
            return Err(AggregationError::NonFiniteScore {
                criterion_id: eval.criterion_id.clone(),
            });
        }
        let judgment = eval.judgment_score.clamp(0.0, 1.0);
        *category_scores.entry(criterion.category).or_insert(0.0) += criterion.weight * judgment;
        confidences
            .entry(criterion.category)
            .or_default()
            .push(eval.confidence.clamp(0.0, 1.0));
    }

    for score in category_scores.values_mut() {
        *score = score.clamp(0.0, 1.0);
    }

    let ethics_score = (mean(category_scores.values().copied()) * 100.0)
        .round()
        .clamp(0.0, 100.0) as u8;
    let grade = Grade::from_score(ethics_score);

    let mut critical_issues: Vec<CriterionEvaluation> = evaluations
        .iter()
        .filter(|e| is_critical(e, config))
        .cloned()
        .collect();
    order_critical(&mut critical_issues);

    let overall_confidence = mean(evaluations.iter().map(|e| e.confidence.clamp(0.0, 1.0)));
    let confidence_by_category = confidences
        .into_iter()
        .map(|(c, v)| (c, mean(v)))
        .collect();
    let risk_level = RiskLevel::derive(grade, critical_issues.len());

    Ok(FinalScore {
        ethics_score,
        category_scores,
        grade,
        critical_issues,
        overall_confidence,
        confidence_by_category,
        risk_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Criterion;
    use crate::scoring::rubric::Verdict;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn criterion(id: &str, category: Category, weight: f64) -> Criterion {
        Criterion {
            criterion_id: id.into(),
            category,
            text: id.into(),
            weight,
            source_clause_refs: Vec::new(),
        }
    }

    fn eval(c: &Criterion, judgment: f64, confidence: f64) -> CriterionEvaluation {
        CriterionEvaluation {
            criterion_id: c.criterion_id.clone(),
            category: c.category,
            weight: c.weight,
            evidence_refs: BTreeSet::new(),
            judgment_score: judgment,
            confidence,
            verdict: Verdict::PartiallyCompliant,
            rationale: String::new(),
        }
    }

    fn set(criteria: Vec<Criterion>) -> CriteriaSet {
        CriteriaSet {
            domain: "medical".into(),
            generated_at: Utc::now(),
            criteria,
        }
    }

    #[test]
    fn low_judgment_is_critical_even_with_fair_confidence() {
        let a = criterion("transparency-01", Category::Transparency, 0.4);
        let b = criterion("transparency-02", Category::Transparency, 0.6);
        let criteria = set(vec![a.clone(), b.clone()]);
        let evals = vec![eval(&a, 0.2, 0.5), eval(&b, 0.9, 0.9)];
        let score = aggregate(&criteria, &evals, &EngineConfig::default()).unwrap();

        assert_eq!(score.critical_issues.len(), 1);
        assert_eq!(score.critical_issues[0].criterion_id, "transparency-01");
        // 0.4 * 0.2 + 0.6 * 0.9
        assert!((score.category_scores[&Category::Transparency] - 0.62).abs() < 1e-9);
    }

    #[test]
    fn ethics_score_is_mean_over_all_categories() {
        let criteria: Vec<Criterion> = Category::ALL
            .iter()
            .map(|c| criterion(&format!("{}-01", c.as_str()), *c, 1.0))
            .collect();
        let evals: Vec<CriterionEvaluation> = criteria.iter().map(|c| eval(c, 0.8, 0.9)).collect();
        let score = aggregate(&set(criteria), &evals, &EngineConfig::default()).unwrap();
        assert_eq!(score.ethics_score, 80);
        assert_eq!(score.grade, Grade::B);
        assert!(score.critical_issues.is_empty());
        assert_eq!(score.risk_level, RiskLevel::Low);
        assert!((score.overall_confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn missing_categories_score_zero() {
        let a = criterion("robustness-01", Category::Robustness, 1.0);
        let score = aggregate(&set(vec![a.clone()]), &[eval(&a, 1.0, 1.0)], &EngineConfig::default())
            .unwrap();
        assert_eq!(score.category_scores.len(), 5);
        assert_eq!(score.category_scores[&Category::Transparency], 0.0);
        assert_eq!(score.ethics_score, 20);
        assert_eq!(score.grade, Grade::F);
    }

    #[test]
    fn critical_issues_are_worst_first() {
        let a = criterion("accountability-01", Category::Accountability, 0.2);
        let b = criterion("accountability-02", Category::Accountability, 0.5);
        let c = criterion("accountability-03", Category::Accountability, 0.3);
        let criteria = set(vec![a.clone(), b.clone(), c.clone()]);
        let evals = vec![eval(&a, 0.1, 0.9), eval(&b, 0.1, 0.9), eval(&c, 0.05, 0.9)];
        let score = aggregate(&criteria, &evals, &EngineConfig::default()).unwrap();
        let order: Vec<&str> = score
            .critical_issues
            .iter()
            .map(|e| e.criterion_id.as_str())
            .collect();
        assert_eq!(order, vec!["accountability-03", "accountability-02", "accountability-01"]);
    }

    #[test]
    fn low_confidence_alone_is_critical() {
        let a = criterion("robustness-01", Category::Robustness, 1.0);
        let score = aggregate(&set(vec![a.clone()]), &[eval(&a, 0.9, 0.1)], &EngineConfig::default())
            .unwrap();
        assert_eq!(score.critical_issues.len(), 1);
    }

    #[test]
    fn unnormalized_weights_fail() {
        let a = criterion("robustness-01", Category::Robustness, 0.5);
        let err = aggregate(&set(vec![a.clone()]), &[eval(&a, 0.5, 0.5)], &EngineConfig::default())
            .unwrap_err();
        assert!(matches!(err, AggregationError::WeightsNotNormalized { .. }));
    }

    #[test]
    fn unknown_criterion_fails() {
        let a = criterion("robustness-01", Category::Robustness, 1.0);
        let stray = criterion("robustness-09", Category::Robustness, 1.0);
        let err = aggregate(&set(vec![a]), &[eval(&stray, 0.5, 0.5)], &EngineConfig::default())
            .unwrap_err();
        assert!(matches!(err, AggregationError::UnknownCriterion { .. }));
    }

    #[test]
    fn non_finite_score_fails() {
        let a = criterion("robustness-01", Category::Robustness, 1.0);
        let err = aggregate(&set(vec![a.clone()]), &[eval(&a, f64::NAN, 0.5)], &EngineConfig::default())
            .unwrap_err();
        assert!(matches!(err, AggregationError::NonFiniteScore { .. }));
    }
}
