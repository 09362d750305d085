//! Evaluation criteria and per-criterion evaluations.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::Category;
use super::error::AggregationError;
use crate::scoring::rubric::Verdict;

/// Most clause citations kept per criterion.
pub const MAX_CLAUSE_REFS: usize = 10;

/// Tolerance for per-category weight sums.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Citation into the regulatory clause corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseRef {
    pub clause_id: String,
    pub similarity: f64,
}

/// One weighted, citation-backed evaluation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub criterion_id: String,
    pub category: Category,
    pub text: String,
    /// In `(0, 1]`; weights within one category sum to 1.
    pub weight: f64,
    /// At most [`MAX_CLAUSE_REFS`], descending similarity.
    pub source_clause_refs: Vec<ClauseRef>,
}

/// Criteria generated for a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaSet {
    pub domain: String,
    pub generated_at: DateTime<Utc>,
    pub criteria: Vec<Criterion>,
}

impl CriteriaSet {
    pub fn get(&self, criterion_id: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.criterion_id == criterion_id)
    }

    /// Criteria grouped by category, in generation order within each group.
    pub fn by_category(&self) -> BTreeMap<Category, Vec<&Criterion>> {
        let mut groups: BTreeMap<Category, Vec<&Criterion>> = BTreeMap::new();
        for criterion in &self.criteria {
            groups.entry(criterion.category).or_default().push(criterion);
        }
        groups
    }

    /// Categories of the fixed taxonomy with no criteria.
    pub fn empty_categories(&self) -> Vec<Category> {
        let groups = self.by_category();
        Category::ALL
            .into_iter()
            .filter(|c| !groups.contains_key(c))
            .collect()
    }

    /// Check every populated category sums to 1 and every weight is in `(0, 1]`.
    pub fn validate_weights(&self) -> Result<(), AggregationError> {
        if self.criteria.is_empty() {
            return Err(AggregationError::EmptyCriteria);
        }
        for (category, criteria) in self.by_category() {
            let sum: f64 = criteria.iter().map(|c| c.weight).sum();
            let bad_weight = criteria
                .iter()
                .any(|c| !c.weight.is_finite() || c.weight <= 0.0 || c.weight > 1.0);
            if bad_weight || (sum - 1.0).abs() > WEIGHT_TOLERANCE {
                return Err(AggregationError::WeightsNotNormalized {
                    category: category.to_string(),
                    sum,
                });
            }
        }
        Ok(())
    }
}

/// Evidence-to-criterion judgment for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionEvaluation {
    pub criterion_id: String,
    pub category: Category,
    /// Copied from the criterion so critical issues can be ordered without a lookup.
    pub weight: f64,
    pub evidence_refs: BTreeSet<String>,
    pub judgment_score: f64,
    pub confidence: f64,
    pub verdict: Verdict,
    pub rationale: String,
}
