//! Scoring invariants exercised through the public scoring API.

use std::collections::BTreeSet;

use chrono::Utc;
use ethaudit_core::domain::{AggregationError, RiskLevel};
use ethaudit_core::fakes::{clause, StaticClauseIndex};
use ethaudit_core::scoring::{aggregate, generate_criteria};
use ethaudit_core::{
    Category, CriteriaSet, Criterion, CriterionEvaluation, EngineConfig, Grade, Verdict,
};

fn criterion(id: &str, category: Category, weight: f64) -> Criterion {
    Criterion {
        criterion_id: id.to_string(),
        category,
        text: format!("{id} obligation"),
        weight,
        source_clause_refs: Vec::new(),
    }
}

fn evaluation(c: &Criterion, judgment: f64, confidence: f64) -> CriterionEvaluation {
    CriterionEvaluation {
        criterion_id: c.criterion_id.clone(),
        category: c.category,
        weight: c.weight,
        evidence_refs: BTreeSet::from(["doc-1".to_string()]),
        judgment_score: judgment,
        confidence,
        verdict: Verdict::PartiallyCompliant,
        rationale: "cited".to_string(),
    }
}

fn criteria_set(criteria: Vec<Criterion>) -> CriteriaSet {
    CriteriaSet {
        domain: "medical".to_string(),
        generated_at: Utc::now(),
        criteria,
    }
}

#[tokio::test]
async fn generated_weights_sum_to_one_per_category() {
    let index = StaticClauseIndex::new(vec![
        clause("art-13", 0.9, Category::Transparency),
        clause("art-50", 0.7, Category::Transparency),
        clause("art-10", 0.8, Category::DataGovernance),
        clause("art-14", 0.6, Category::HumanOversight),
        clause("art-15", 0.5, Category::Robustness),
        clause("art-17", 0.4, Category::Accountability),
        clause("art-26", 0.3, Category::HumanOversight),
    ]);
    let set = generate_criteria(&index, "medical", 10, 5).await.unwrap();

    let groups = set.by_category();
    for category in Category::ALL {
        let group = groups.get(&category).unwrap();
        assert!(!group.is_empty(), "{category} has no criteria");
        let sum: f64 = group.iter().map(|c| c.weight).sum();
        assert!((sum - 1.0).abs() < 1e-6, "{category} weights sum to {sum}");
    }
    assert!(set.validate_weights().is_ok());
}

#[test]
fn heavy_low_scoring_criterion_is_critical() {
    let heavy = criterion("transparency-01", Category::Transparency, 0.4);
    let light_a = criterion("transparency-02", Category::Transparency, 0.3);
    let light_b = criterion("transparency-03", Category::Transparency, 0.3);
    let set = criteria_set(vec![heavy.clone(), light_a.clone(), light_b.clone()]);
    let evaluations = vec![
        evaluation(&heavy, 0.2, 0.5),
        evaluation(&light_a, 0.9, 0.8),
        evaluation(&light_b, 0.8, 0.8),
    ];

    let score = aggregate(&set, &evaluations, &EngineConfig::default()).unwrap();

    assert_eq!(score.critical_issues.len(), 1);
    assert_eq!(score.critical_issues[0].criterion_id, "transparency-01");
    let transparency = score.category_scores[&Category::Transparency];
    assert!((transparency - (0.4 * 0.2 + 0.3 * 0.9 + 0.3 * 0.8)).abs() < 1e-9);
    // categories without criteria score zero
    assert_eq!(score.category_scores[&Category::HumanOversight], 0.0);
}

#[test]
fn ethics_score_is_bounded_and_graded() {
    let criteria: Vec<Criterion> = Category::ALL
        .iter()
        .map(|c| criterion(&format!("{}-01", c.as_str()), *c, 1.0))
        .collect();
    let set = criteria_set(criteria.clone());
    let config = EngineConfig::default();

    let perfect: Vec<_> = criteria.iter().map(|c| evaluation(c, 1.0, 1.0)).collect();
    let top = aggregate(&set, &perfect, &config).unwrap();
    assert_eq!(top.ethics_score, 100);
    assert_eq!(top.grade, Grade::A);
    assert_eq!(top.risk_level, RiskLevel::Low);

    let zero: Vec<_> = criteria.iter().map(|c| evaluation(c, 0.0, 0.0)).collect();
    let bottom = aggregate(&set, &zero, &config).unwrap();
    assert_eq!(bottom.ethics_score, 0);
    assert_eq!(bottom.grade, Grade::F);
    assert_eq!(bottom.critical_issues.len(), 5);
}

#[test]
fn grade_cutoffs_are_inclusive() {
    assert_eq!(Grade::from_score(85), Grade::A);
    assert_eq!(Grade::from_score(84), Grade::B);
    assert_eq!(Grade::from_score(70), Grade::B);
    assert_eq!(Grade::from_score(55), Grade::C);
    assert_eq!(Grade::from_score(40), Grade::D);
    assert_eq!(Grade::from_score(39), Grade::F);
}

#[test]
fn unnormalized_weights_are_rejected() {
    let a = criterion("transparency-01", Category::Transparency, 0.7);
    let b = criterion("transparency-02", Category::Transparency, 0.7);
    let set = criteria_set(vec![a.clone(), b.clone()]);
    let err = aggregate(
        &set,
        &[evaluation(&a, 0.5, 0.5), evaluation(&b, 0.5, 0.5)],
        &EngineConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, AggregationError::WeightsNotNormalized { .. }));
}
