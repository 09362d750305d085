//! Error taxonomy for evaluation runs.
//!
//! Collection and analysis failures are absorbed into the run state as
//! warnings. Retrieval and aggregation failures abort the run.

use chrono::{DateTime, Utc};
use ethaudit_state::StorageError;
use serde::{Deserialize, Serialize};

/// A collector could not deliver documents.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollectionError {
    #[error("collector {collector} unavailable: {reason}")]
    Unavailable { collector: String, reason: String },

    #[error("collector {collector} timed out after {secs}s")]
    Timeout { collector: String, secs: u64 },

    #[error("collector {collector} returned malformed data: {reason}")]
    Malformed { collector: String, reason: String },
}

/// Merged documents could not be analysed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("malformed document {source_id}: {reason}")]
    MalformedDocument { source_id: String, reason: String },
}

/// The regulatory clause corpus could not produce criteria.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RetrievalError {
    #[error("clause index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("clause index returned no clauses for domain {domain}")]
    EmptyCorpus { domain: String },

    #[error("clause {clause_id} has invalid similarity {similarity}")]
    InvalidHit { clause_id: String, similarity: f64 },
}

/// Criterion weights or scores are internally inconsistent.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggregationError {
    #[error("weights for category {category} sum to {sum}, expected 1")]
    WeightsNotNormalized { category: String, sum: f64 },

    #[error("evaluation references unknown criterion {criterion_id}")]
    UnknownCriterion { criterion_id: String },

    #[error("non-finite score for criterion {criterion_id}")]
    NonFiniteScore { criterion_id: String },

    #[error("criteria set is empty")]
    EmptyCriteria,
}

/// The judgment collaborator failed for one criterion. Never fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JudgeError {
    #[error("judge unavailable: {0}")]
    Unavailable(String),

    #[error("unknown verdict label: {0}")]
    UnknownVerdict(String),
}

/// ethaudit errors.
#[derive(Debug, thiserror::Error)]
pub enum EthauditError {
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    #[error("collection error: {0}")]
    Collection(#[from] CollectionError),

    #[error("analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("invalid transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    #[error("run exceeded its step budget of {budget} transitions")]
    StepBudgetExceeded { budget: u32 },

    #[error("report rendering failed: {0}")]
    Render(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EthauditError {
    /// Whether this error aborts the run (moves it to `failed`).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EthauditError::Retrieval(_)
                | EthauditError::Aggregation(_)
                | EthauditError::InvalidTransition { .. }
                | EthauditError::StepBudgetExceeded { .. }
        )
    }

    /// Short class label recorded in error logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EthauditError::Retrieval(_) => "retrieval",
            EthauditError::Aggregation(_) => "aggregation",
            EthauditError::Collection(_) => "collection",
            EthauditError::Analysis(_) => "analysis",
            EthauditError::Config(_) => "config",
            EthauditError::InvalidTransition { .. } => "invalid_transition",
            EthauditError::StepBudgetExceeded { .. } => "step_budget",
            EthauditError::Render(_) => "render",
            EthauditError::Storage(_) => "storage",
            EthauditError::Serialization(_) => "serialization",
            EthauditError::DigestMismatch { .. } => "digest_mismatch",
            EthauditError::RunNotFound(_) => "run_not_found",
            EthauditError::Io(_) => "io",
        }
    }
}

/// Result type for ethaudit operations.
pub type Result<T> = std::result::Result<T, EthauditError>;

/// How much an error degraded the reliability of the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorImpact {
    None,
    Low,
    Medium,
    High,
}

/// One error recorded on the run state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLog {
    pub stage: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
    pub recovered: bool,
    pub impact: ErrorImpact,
}

impl ErrorLog {
    pub fn new(
        stage: impl Into<String>,
        error: impl std::fmt::Display,
        recovered: bool,
        impact: ErrorImpact,
    ) -> Self {
        Self {
            stage: stage.into(),
            error: error.to_string(),
            timestamp: Utc::now(),
            recovered,
            impact,
        }
    }
}
