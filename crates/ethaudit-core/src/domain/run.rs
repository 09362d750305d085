//! Run state: the versioned value threaded through every stage.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::category::Category;
use super::criterion::{CriteriaSet, CriterionEvaluation};
use super::document::{Document, EvidenceSet, ReliabilityTier};
use super::error::ErrorLog;
use super::score::FinalScore;
use crate::analysis::AnalysisResult;
use crate::quality::QualityAssessment;
use crate::report::SourceSummary;
use crate::retry::RetryDecision;

/// Hard ceiling on insufficiency back-edges per run.
pub const MAX_RETRIES: u32 = 2;

/// Documents younger than this count as recent in collection summaries.
pub const RECENT_WINDOW_DAYS: i64 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Init,
    Collection,
    Analysis,
    Evaluation,
    Report,
    Done,
    Failed,
}

impl RunStage {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStage::Init => "init",
            RunStage::Collection => "collection",
            RunStage::Analysis => "analysis",
            RunStage::Evaluation => "evaluation",
            RunStage::Report => "report",
            RunStage::Done => "done",
            RunStage::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunStage::Done | RunStage::Failed)
    }
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    Pending,
    Completed,
    /// Some documents arrived but the collector also reported problems.
    Partial,
    Failed,
}

/// Per-collector statistics for one collection pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub collector: String,
    pub pass: u32,
    pub status: CollectionStatus,
    pub count: usize,
    /// Document count per host (or `"other"` for non-URL references).
    pub sources_breakdown: BTreeMap<String, usize>,
    pub average_reliability: f64,
    pub newest: Option<DateTime<Utc>>,
    pub oldest: Option<DateTime<Utc>>,
    pub recent_documents_count: usize,
    pub high_reliability_count: usize,
    pub medium_reliability_count: usize,
    pub low_reliability_count: usize,
    pub error: Option<String>,
}

impl CollectionSummary {
    pub fn pending(collector: impl Into<String>, pass: u32) -> Self {
        Self {
            collector: collector.into(),
            pass,
            status: CollectionStatus::Pending,
            count: 0,
            sources_breakdown: BTreeMap::new(),
            average_reliability: 0.0,
            newest: None,
            oldest: None,
            recent_documents_count: 0,
            high_reliability_count: 0,
            medium_reliability_count: 0,
            low_reliability_count: 0,
            error: None,
        }
    }

    /// Summarize a batch. `error` marks the pass failed when the batch is
    /// empty and partial otherwise.
    pub fn from_documents(
        collector: impl Into<String>,
        pass: u32,
        documents: &[Document],
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut summary = Self::pending(collector, pass);
        summary.count = documents.len();
        summary.status = match (&error, documents.is_empty()) {
            (None, _) => CollectionStatus::Completed,
            (Some(_), true) => CollectionStatus::Failed,
            (Some(_), false) => CollectionStatus::Partial,
        };
        summary.error = error;
        if documents.is_empty() {
            return summary;
        }

        let recent_cutoff = now - Duration::days(RECENT_WINDOW_DAYS);
        let mut reliability_sum = 0.0;
        for doc in documents {
            let host = doc.host().unwrap_or_else(|| "other".to_string());
            *summary.sources_breakdown.entry(host).or_insert(0) += 1;
            reliability_sum += doc.reliability_score;
            match doc.tier() {
                ReliabilityTier::High => summary.high_reliability_count += 1,
                ReliabilityTier::Medium => summary.medium_reliability_count += 1,
                ReliabilityTier::Low => summary.low_reliability_count += 1,
            }
            if let Some(published) = doc.published_at {
                summary.newest = Some(summary.newest.map_or(published, |n| n.max(published)));
                summary.oldest = Some(summary.oldest.map_or(published, |o| o.min(published)));
                if published >= recent_cutoff {
                    summary.recent_documents_count += 1;
                }
            }
        }
        summary.average_reliability = reliability_sum / documents.len() as f64;
        summary
    }
}

/// Query hints the retry controller hands to collectors on the next pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionFocus {
    /// Categories with no supporting evidence so far.
    pub categories: Vec<Category>,
    /// Quality facets that dragged the score down (`diversity`, `recency`, `reliability`).
    pub facets: Vec<String>,
}

impl CollectionFocus {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.facets.is_empty()
    }
}

/// One stage execution, for the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub stage: RunStage,
    pub action: String,
    pub duration_ms: u64,
    pub documents_processed: usize,
    pub timestamp: DateTime<Utc>,
}

/// The single record threaded through every stage of one evaluation.
///
/// Stages take the state by value and return the updated state; every stage
/// transition bumps `version`. Identity fields are fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    run_id: Uuid,
    company_name: String,
    domain: String,
    pub version: u64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub current_stage: RunStage,
    pub retry_count: u32,
    pub collect_passes: u32,

    // collection
    pub web_collection: Option<CollectionSummary>,
    pub specialized_collection: Option<CollectionSummary>,
    pub merged_documents: EvidenceSet,
    pub quality: Option<QualityAssessment>,
    pub quality_score: Option<f64>,
    pub is_data_sufficient: bool,
    pub collection_focus: CollectionFocus,

    // analysis
    pub analysis_result: Option<AnalysisResult>,
    pub analysis_score: f64,
    pub is_analysis_sufficient: bool,

    // evaluation
    pub criteria: Option<CriteriaSet>,
    pub evaluations: Vec<CriterionEvaluation>,
    pub final_score: Option<FinalScore>,

    // report
    pub report_path: Option<String>,
    pub source_summary: Option<SourceSummary>,

    pub warnings: Vec<String>,
    pub limitations: Vec<String>,
    pub errors: Vec<ErrorLog>,
    pub execution_log: Vec<ExecutionLog>,
    pub retry_log: Vec<RetryDecision>,
}

impl RunState {
    pub fn new(company_name: impl Into<String>, domain: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            company_name: company_name.into(),
            domain: domain.into(),
            version: 0,
            started_at: now,
            updated_at: now,
            current_stage: RunStage::Init,
            retry_count: 0,
            collect_passes: 0,
            web_collection: None,
            specialized_collection: None,
            merged_documents: EvidenceSet::new(),
            quality: None,
            quality_score: None,
            is_data_sufficient: false,
            collection_focus: CollectionFocus::default(),
            analysis_result: None,
            analysis_score: 0.0,
            is_analysis_sufficient: false,
            criteria: None,
            evaluations: Vec::new(),
            final_score: None,
            report_path: None,
            source_summary: None,
            warnings: Vec::new(),
            limitations: Vec::new(),
            errors: Vec::new(),
            execution_log: Vec::new(),
            retry_log: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Path-safe string form used as the store key and report file stem.
    pub fn run_key(&self) -> String {
        self.run_id.to_string()
    }

    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn is_terminal(&self) -> bool {
        self.current_stage.is_terminal()
    }

    /// Move to `stage`, bumping the version.
    pub fn enter(mut self, stage: RunStage) -> Self {
        self.current_stage = stage;
        self.version += 1;
        self.updated_at = Utc::now();
        self
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Record a warning unless the same text is already present.
    pub fn warn_once(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.warnings.contains(&message) {
            self.warnings.push(message);
        }
    }

    /// Record a limitation once; repeats are dropped.
    pub fn limit(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.limitations.contains(&message) {
            self.limitations.push(message);
        }
    }

    pub fn record_error(&mut self, log: ErrorLog) {
        self.errors.push(log);
    }

    pub fn log_execution(
        &mut self,
        stage: RunStage,
        action: impl Into<String>,
        started: std::time::Instant,
        documents_processed: usize,
    ) {
        self.execution_log.push(ExecutionLog {
            stage,
            action: action.into(),
            duration_ms: started.elapsed().as_millis() as u64,
            documents_processed,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::SourceType;

    #[test]
    fn new_run_starts_at_init() {
        let run = RunState::new("Acme Health", "medical");
        assert_eq!(run.current_stage, RunStage::Init);
        assert_eq!(run.retry_count, 0);
        assert_eq!(run.version, 0);
        assert_eq!(run.company_name(), "Acme Health");
        assert_eq!(run.domain(), "medical");
        assert!(run.merged_documents.is_empty());
    }

    #[test]
    fn enter_bumps_version_and_keeps_identity() {
        let run = RunState::new("Acme", "finance");
        let id = run.run_id();
        let run = run.enter(RunStage::Collection).enter(RunStage::Analysis);
        assert_eq!(run.version, 2);
        assert_eq!(run.current_stage, RunStage::Analysis);
        assert_eq!(run.run_id(), id);
    }

    #[test]
    fn limitations_are_deduplicated() {
        let mut run = RunState::new("Acme", "finance");
        run.limit("insufficient evidence");
        run.limit("insufficient evidence");
        assert_eq!(run.limitations.len(), 1);
    }

    #[test]
    fn run_state_round_trips_through_json() {
        let mut run = RunState::new("Acme", "education").enter(RunStage::Collection);
        run.merged_documents.merge([Document::new(
            "d1",
            SourceType::Web,
            "https://acme.example/ethics",
            0.8,
        )]);
        run.warn("web collector slow");
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["current_stage"], "collection");
        let back: RunState = serde_json::from_value(json).unwrap();
        assert_eq!(back, run);
    }

    #[test]
    fn summary_counts_tiers_and_hosts() {
        let now = Utc::now();
        let docs = vec![
            Document::new("a", SourceType::Web, "https://news.example/a", 0.9)
                .with_published_at(now - Duration::days(10)),
            Document::new("b", SourceType::Web, "https://news.example/b", 0.5)
                .with_published_at(now - Duration::days(400)),
            Document::new("c", SourceType::Web, "registry:42", 0.2),
        ];
        let summary = CollectionSummary::from_documents("web", 1, &docs, None, now);
        assert_eq!(summary.status, CollectionStatus::Completed);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.sources_breakdown["news.example"], 2);
        assert_eq!(summary.sources_breakdown["other"], 1);
        assert_eq!(summary.high_reliability_count, 1);
        assert_eq!(summary.medium_reliability_count, 1);
        assert_eq!(summary.low_reliability_count, 1);
        assert_eq!(summary.recent_documents_count, 1);
        assert!((summary.average_reliability - (1.6 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn summary_status_reflects_error() {
        let now = Utc::now();
        let failed = CollectionSummary::from_documents("web", 1, &[], Some("down".into()), now);
        assert_eq!(failed.status, CollectionStatus::Failed);
        let docs = vec![Document::new("a", SourceType::Web, "https://x.example", 0.5)];
        let partial =
            CollectionSummary::from_documents("web", 1, &docs, Some("one page failed".into()), now);
        assert_eq!(partial.status, CollectionStatus::Partial);
    }
}
