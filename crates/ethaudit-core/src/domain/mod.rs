//! ethaudit domain model: run state, evidence, criteria and scores.

pub mod category;
pub mod criterion;
pub mod document;
pub mod error;
pub mod run;
pub mod score;

pub use category::Category;
pub use criterion::{ClauseRef, CriteriaSet, Criterion, CriterionEvaluation};
pub use document::{normalize_url, Document, EvidenceSet, MergeStats, ReliabilityTier, SourceType};
pub use error::{
    AggregationError, AnalysisError, CollectionError, ErrorImpact, ErrorLog, EthauditError,
    JudgeError, Result, RetrievalError,
};
pub use run::{
    CollectionFocus, CollectionStatus, CollectionSummary, ExecutionLog, RunStage, RunState,
    MAX_RETRIES,
};
pub use score::{FinalScore, Grade, RiskLevel};
