//! ethaudit core library
//!
//! Evidence-based ethics assessment of a company's AI systems against the
//! EU AI Act. A run collects public evidence, gates on its quality, maps it
//! to regulatory criteria and aggregates a weighted 0-100 ethics score.

pub mod adapters;
pub mod analysis;
pub mod collaborators;
pub mod config;
pub mod domain;
pub mod fakes;
pub mod fsm;
pub mod gate;
pub mod metrics;
pub mod obs;
pub mod pipeline;
pub mod quality;
pub mod report;
pub mod retry;
pub mod scoring;
pub mod stages;
pub mod telemetry;

pub use adapters::{ClauseRecord, JsonFileCollector, LexicalClauseIndex, RuleJudge};

pub use collaborators::{
    ClauseHit, ClauseIndex, CollectionBatch, CollectionRequest, Collaborators, Collector, Judge,
    JudgeOutput, ReportRenderer,
};

pub use config::{EngineConfig, Thresholds};

pub use domain::{
    Category, CriteriaSet, Criterion, CriterionEvaluation, Document, EthauditError, EvidenceSet,
    FinalScore, Grade, Result, RiskLevel, RunStage, RunState, SourceType,
};

pub use fsm::{GateDecision, StageEvent};
pub use gate::{evaluate_gate, GatePoint, SufficiencyVerdict};
pub use pipeline::Pipeline;
pub use report::{render_markdown, MarkdownReportRenderer, ReportPayload, ReportStatus};
pub use retry::RetryController;
pub use scoring::Verdict;
pub use telemetry::init_tracing;
