//! Structural analysis of merged evidence.
//!
//! `analysis_score = 0.6 * coverage + 0.4 * cross_validation`, where coverage
//! is the share of categories with any supporting document and
//! cross-validation is the share of covered categories backed by at least two
//! distinct hosts.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::{AnalysisError, Category, EvidenceSet, ReliabilityTier, SourceType};

const COVERAGE_WEIGHT: f64 = 0.6;
const CROSS_VALIDATION_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis_score: f64,
    pub coverage: f64,
    pub cross_validation: f64,
    /// Supporting `source_id`s per category.
    pub documents_by_category: BTreeMap<Category, Vec<String>>,
    pub uncovered_categories: Vec<Category>,
    pub source_types: BTreeMap<SourceType, usize>,
    pub reliability_tiers: BTreeMap<ReliabilityTier, usize>,
}

impl AnalysisResult {
    pub fn empty() -> Self {
        Self {
            analysis_score: 0.0,
            coverage: 0.0,
            cross_validation: 0.0,
            documents_by_category: BTreeMap::new(),
            uncovered_categories: Category::ALL.to_vec(),
            source_types: BTreeMap::new(),
            reliability_tiers: BTreeMap::new(),
        }
    }
}

/// Analyse merged evidence. Any malformed document fails the whole analysis.
pub fn analyze(evidence: &EvidenceSet) -> Result<AnalysisResult, AnalysisError> {
    for doc in evidence.iter() {
        doc.validate()?;
    }
    if evidence.is_empty() {
        return Ok(AnalysisResult::empty());
    }

    let mut documents_by_category: BTreeMap<Category, Vec<String>> = BTreeMap::new();
    let mut hosts_by_category: BTreeMap<Category, BTreeSet<String>> = BTreeMap::new();
    let mut source_types = BTreeMap::new();
    let mut reliability_tiers = BTreeMap::new();

    for doc in evidence.iter() {
        *source_types.entry(doc.source_type).or_insert(0) += 1;
        *reliability_tiers.entry(doc.tier()).or_insert(0) += 1;
        let host = doc.host().unwrap_or_else(|| doc.identity_key());
        for category in doc.effective_topics() {
            documents_by_category
                .entry(category)
                .or_default()
                .push(doc.source_id.clone());
            hosts_by_category
                .entry(category)
                .or_default()
                .insert(host.clone());
        }
    }

    let covered = documents_by_category.len();
    let coverage = covered as f64 / Category::ALL.len() as f64;
    let cross_validated = hosts_by_category.values().filter(|h| h.len() >= 2).count();
    let cross_validation = if covered == 0 {
        0.0
    } else {
        cross_validated as f64 / covered as f64
    };
    let uncovered_categories = Category::ALL
        .into_iter()
        .filter(|c| !documents_by_category.contains_key(c))
        .collect();

    Ok(AnalysisResult {
        analysis_score: COVERAGE_WEIGHT * coverage + CROSS_VALIDATION_WEIGHT * cross_validation,
        coverage,
        cross_validation,
        documents_by_category,
        uncovered_categories,
        source_types,
        reliability_tiers,
    })
}
