//! Domain-adaptive criteria generation.
//!
//! One similarity query per category is issued against the clause index.
//! Hits are boosted by domain keywords, de-duplicated by clause id, grouped by
//! their metadata category tag (falling back to the category that queried
//! them) and ranked. The top clauses of each category anchor one criterion
//! each. Output is deterministic for a fixed corpus snapshot and domain.

use std::collections::BTreeMap;

use chrono::Utc;
use futures::future::try_join_all;
use tracing::debug;

use super::keywords::{criteria_query, domain_keyword_hits};
use crate::collaborators::{ClauseHit, ClauseIndex};
use crate::domain::criterion::MAX_CLAUSE_REFS;
use crate::domain::{Category, ClauseRef, CriteriaSet, Criterion, RetrievalError};

const BOOST_PER_KEYWORD: f64 = 0.05;
const MAX_BOOST: f64 = 0.15;
const MAX_CRITERION_TEXT: usize = 240;

#[derive(Debug, Clone)]
struct RankedClause {
    hit: ClauseHit,
    category: Category,
    score: f64,
}

fn boosted(hit: &ClauseHit, domain: &str) -> f64 {
    let boost = (domain_keyword_hits(&hit.text, domain) as f64 * BOOST_PER_KEYWORD).min(MAX_BOOST);
    (hit.similarity + boost).min(1.0)
}

fn check_hit(hit: &ClauseHit) -> Result<(), RetrievalError> {
    if hit.similarity.is_finite() && (0.0..=1.0).contains(&hit.similarity) {
        Ok(())
    } else {
        Err(RetrievalError::InvalidHit {
            clause_id: hit.clause_id.clone(),
            similarity: hit.similarity,
        })
    }
}

fn criterion_text(category: Category, clause: &str) -> String {
    let clause = clause.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut text: String = clause.chars().take(MAX_CRITERION_TEXT).collect();
    if clause.chars().count() > MAX_CRITERION_TEXT {
        text.push_str("...");
    }
    format!("{}: {}", category.title(), text)
}

/// Weights from clause importance when every anchor declares one, else uniform.
fn weights(anchors: &[RankedClause]) -> Vec<f64> {
    let importances: Option<Vec<f64>> = anchors
        .iter()
        .map(|c| c.hit.importance.filter(|i| i.is_finite() && *i > 0.0))
        .collect();
    match importances {
        Some(values) => {
            let total: f64 = values.iter().sum();
            values.iter().map(|v| v / total).collect()
        }
        None => vec![1.0 / anchors.len() as f64; anchors.len()],
    }
}

/// Rank deduplicated clauses per category.
fn rank(
    results: Vec<(Category, Vec<ClauseHit>)>,
    domain: &str,
) -> Result<BTreeMap<Category, Vec<RankedClause>>, RetrievalError> {
    let mut unique: BTreeMap<String, RankedClause> = BTreeMap::new();
    for (queried, hits) in results {
        for hit in hits {
            check_hit(&hit)?;
            let score = boosted(&hit, domain);
            let category = hit.category.unwrap_or(queried);
            match unique.get(&hit.clause_id) {
                Some(existing) if existing.score >= score => {}
                _ => {
                    unique.insert(
                        hit.clause_id.clone(),
                        RankedClause {
                            hit,
                            category,
                            score,
                        },
                    );
                }
            }
        }
    }

    let mut grouped: BTreeMap<Category, Vec<RankedClause>> = BTreeMap::new();
    for clause in unique.into_values() {
        grouped.entry(clause.category).or_default().push(clause);
    }
    for clauses in grouped.values_mut() {
        clauses.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.hit.clause_id.cmp(&b.hit.clause_id))
        });
    }
    Ok(grouped)
}

/// Generate the criteria set for `domain`.
///
/// Fails when the index is unavailable or returns nothing at all. A category
/// that gets no clauses simply has no criteria.
pub async fn generate_criteria(
    index: &dyn ClauseIndex,
    domain: &str,
    k: usize,
    max_per_category: usize,
) -> Result<CriteriaSet, RetrievalError> {
    let searches = Category::ALL.into_iter().map(|category| async move {
        let query = criteria_query(category, domain);
        let hits = index.search(&query, domain, k).await?;
        debug!(category = %category, hits = hits.len(), "clause search complete");
        Ok::<_, RetrievalError>((category, hits))
    });
    let results = try_join_all(searches).await?;

    let grouped = rank(results, domain)?;
    if grouped.is_empty() {
        return Err(RetrievalError::EmptyCorpus {
            domain: domain.to_string(),
        });
    }

    let mut criteria = Vec::new();
    for category in Category::ALL {
        let Some(clauses) = grouped.get(&category) else {
            continue;
        };
        let anchors: Vec<RankedClause> = clauses.iter().take(max_per_category).cloned().collect();
        let weights = weights(&anchors);
        for (i, (anchor, weight)) in anchors.iter().zip(weights).enumerate() {
            let source_clause_refs = clauses[i..]
                .iter()
                .take(MAX_CLAUSE_REFS)
                .map(|c| ClauseRef {
                    clause_id: c.hit.clause_id.clone(),
                    similarity: c.score,
                })
                .collect();
            criteria.push(Criterion {
                criterion_id: format!("{}-{:02}", category.as_str(), i + 1),
                category,
                text: criterion_text(category, &anchor.hit.text),
                weight,
                source_clause_refs,
            });
        }
    }

    Ok(CriteriaSet {
        domain: domain.to_string(),
        generated_at: Utc::now(),
        criteria,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FailingClauseIndex, StaticClauseIndex};

    fn hit(id: &str, sim: f64, category: Option<Category>, importance: Option<f64>) -> ClauseHit {
        ClauseHit {
            clause_id: id.to_string(),
            similarity: sim,
            text: format!("Article {id} obligations for providers"),
            category,
            importance,
        }
    }

    #[tokio::test]
    async fn weights_normalize_per_category() {
        let index = StaticClauseIndex::new(vec![
            hit("art13-1", 0.9, Some(Category::Transparency), None),
            hit("art13-2", 0.8, Some(Category::Transparency), None),
            hit("art13-3", 0.7, Some(Category::Transparency), None),
            hit("art14-1", 0.6, Some(Category::HumanOversight), Some(3.0)),
            hit("art14-2", 0.5, Some(Category::HumanOversight), Some(1.0)),
        ]);
        let set = generate_criteria(&index, "medical", 10, 5).await.unwrap();
        set.validate_weights().unwrap();

        let oversight: Vec<f64> = set
            .criteria
            .iter()
            .filter(|c| c.category == Category::HumanOversight)
            .map(|c| c.weight)
            .collect();
        assert_eq!(oversight, vec![0.75, 0.25]);

        let transparency = set
            .criteria
            .iter()
            .filter(|c| c.category == Category::Transparency)
            .count();
        assert_eq!(transparency, 3);
    }

    #[tokio::test]
    async fn refs_are_sorted_and_bounded() {
        let hits: Vec<ClauseHit> = (0..14)
            .map(|i| hit(&format!("c{i:02}"), 0.9 - i as f64 * 0.01, Some(Category::Robustness), None))
            .collect();
        let index = StaticClauseIndex::new(hits);
        let set = generate_criteria(&index, "finance", 10, 5).await.unwrap();
        for criterion in &set.criteria {
            assert!(criterion.source_clause_refs.len() <= MAX_CLAUSE_REFS);
            let sims: Vec<f64> = criterion.source_clause_refs.iter().map(|r| r.similarity).collect();
            assert!(sims.windows(2).all(|w| w[0] >= w[1]));
        }
        assert_eq!(set.criteria.len(), 5);
        assert_eq!(set.criteria[0].criterion_id, "robustness-01");
    }

    #[tokio::test]
    async fn ties_break_by_clause_id() {
        let index = StaticClauseIndex::new(vec![
            hit("b", 0.5, Some(Category::Accountability), None),
            hit("a", 0.5, Some(Category::Accountability), None),
        ]);
        let set = generate_criteria(&index, "education", 10, 1).await.unwrap();
        assert_eq!(set.criteria.len(), 1);
        assert_eq!(set.criteria[0].source_clause_refs[0].clause_id, "a");
    }

    #[tokio::test]
    async fn untagged_hits_fall_back_to_queried_category() {
        let index = StaticClauseIndex::new(vec![hit("x", 0.4, None, None)]);
        let set = generate_criteria(&index, "medical", 10, 5).await.unwrap();
        // The same untagged clause answers every query; the first category wins.
        assert_eq!(set.criteria.len(), 1);
        assert_eq!(set.criteria[0].category, Category::Transparency);
    }

    #[tokio::test]
    async fn domain_keywords_boost_similarity() {
        let mut plain = hit("plain", 0.5, Some(Category::Robustness), None);
        plain.text = "Providers shall test systems".into();
        let mut clinical = hit("clinical", 0.5, Some(Category::Robustness), None);
        clinical.text = "Clinical validation with patient safety endpoints".into();
        let index = StaticClauseIndex::new(vec![plain, clinical]);
        let set = generate_criteria(&index, "medical", 10, 1).await.unwrap();
        let top = &set.criteria[0].source_clause_refs[0];
        assert_eq!(top.clause_id, "clinical");
        assert!((top.similarity - 0.65).abs() < 1e-9);
    }

    #[tokio::test]
    async fn generation_is_deterministic() {
        let hits = vec![
            hit("a", 0.7, Some(Category::DataGovernance), None),
            hit("b", 0.9, Some(Category::Transparency), Some(2.0)),
            hit("c", 0.8, Some(Category::DataGovernance), None),
        ];
        let first = generate_criteria(&StaticClauseIndex::new(hits.clone()), "finance", 10, 5)
            .await
            .unwrap();
        let second = generate_criteria(&StaticClauseIndex::new(hits), "finance", 10, 5)
            .await
            .unwrap();
        assert_eq!(first.criteria, second.criteria);
    }

    #[tokio::test]
    async fn empty_corpus_is_a_retrieval_error() {
        let index = StaticClauseIndex::new(Vec::new());
        let err = generate_criteria(&index, "medical", 10, 5).await.unwrap_err();
        assert!(matches!(err, RetrievalError::EmptyCorpus { .. }));
    }

    #[tokio::test]
    async fn unavailable_index_propagates() {
        let err = generate_criteria(&FailingClauseIndex, "medical", 10, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::IndexUnavailable(_)));
    }

    #[tokio::test]
    async fn out_of_range_similarity_is_rejected() {
        let index = StaticClauseIndex::new(vec![hit("bad", 1.2, None, None)]);
        let err = generate_criteria(&index, "medical", 10, 5).await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidHit { .. }));
    }
}
