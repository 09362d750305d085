//! Data-quality assessment of merged evidence.
//!
//! - diversity: `0.5 * (source types / 2) + 0.5 * min(hosts / 4, 1)`
//! - recency: mean of `0.5^(age_days / half_life)`, undated documents count 0
//! - reliability: mean `reliability_score`
//!
//! `quality_score = 0.35 * diversity + 0.30 * recency + 0.35 * reliability`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Document, EvidenceSet};

const DIVERSITY_WEIGHT: f64 = 0.35;
const RECENCY_WEIGHT: f64 = 0.30;
const RELIABILITY_WEIGHT: f64 = 0.35;

/// Source types the collectors can produce.
const SOURCE_TYPE_COUNT: f64 = 2.0;
/// Distinct hosts at which host diversity saturates.
const HOST_SATURATION: f64 = 4.0;
/// Facets scoring below this are reported as weak.
const WEAK_FACET: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub quality_score: f64,
    pub diversity: f64,
    pub recency: f64,
    pub reliability: f64,
    pub document_count: usize,
    pub distinct_source_types: usize,
    pub distinct_hosts: usize,
    pub is_data_sufficient: bool,
    /// Facets below 0.5, used to steer the next collection pass.
    pub weak_facets: Vec<String>,
}

/// Reliability limited to `[0, 1]`; non-finite values count as 0.
pub fn clamped_reliability(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Monotonic decay: 1 at age 0, halving every `half_life_days`.
pub fn recency_factor(doc: &Document, now: DateTime<Utc>, half_life_days: f64) -> f64 {
    match doc.age_days(now) {
        Some(age) => 0.5f64.powf(age / half_life_days),
        None => 0.0,
    }
}

pub fn assess_quality(
    evidence: &EvidenceSet,
    now: DateTime<Utc>,
    half_life_days: f64,
    threshold: f64,
) -> QualityAssessment {
    let n = evidence.len();
    if n == 0 {
        return QualityAssessment {
            quality_score: 0.0,
            diversity: 0.0,
            recency: 0.0,
            reliability: 0.0,
            document_count: 0,
            distinct_source_types: 0,
            distinct_hosts: 0,
            is_data_sufficient: false,
            weak_facets: vec![
                "diversity".to_string(),
                "recency".to_string(),
                "reliability".to_string(),
            ],
        };
    }

    let source_types: BTreeSet<_> = evidence.iter().map(|d| d.source_type).collect();
    let hosts: BTreeSet<String> = evidence.iter().filter_map(Document::host).collect();

    let diversity = 0.5 * (source_types.len() as f64 / SOURCE_TYPE_COUNT).min(1.0)
        + 0.5 * (hosts.len() as f64 / HOST_SATURATION).min(1.0);
    let recency = evidence
        .iter()
        .map(|d| recency_factor(d, now, half_life_days))
        .sum::<f64>()
        / n as f64;
    let reliability = evidence
        .iter()
        .map(|d| clamped_reliability(d.reliability_score))
        .sum::<f64>()
        / n as f64;

    let quality_score = (DIVERSITY_WEIGHT * diversity
        + RECENCY_WEIGHT * recency
        + RELIABILITY_WEIGHT * reliability)
        .clamp(0.0, 1.0);

    let weak_facets = [
        ("diversity", diversity),
        ("recency", recency),
        ("reliability", reliability),
    ]
    .into_iter()
    .filter(|(_, v)| *v < WEAK_FACET)
    .map(|(name, _)| name.to_string())
    .collect();

    QualityAssessment {
        quality_score,
        diversity,
        recency,
        reliability,
        document_count: n,
        distinct_source_types: source_types.len(),
        distinct_hosts: hosts.len(),
        is_data_sufficient: quality_score >= threshold,
        weak_facets,
    }
}
