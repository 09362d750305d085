//! Seams to the external services the engine consumes.
//!
//! Collection, clause retrieval, qualitative judgment and rendering all live
//! behind these traits. The engine never performs their I/O itself.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{
    Category, CollectionError, CollectionFocus, Document, JudgeError, Result, RetrievalError,
    SourceType,
};
use crate::report::ReportPayload;

/// What a collector is asked for on one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRequest {
    pub company_name: String,
    pub domain: String,
    pub query: String,
    /// 1-based collection pass.
    pub pass: u32,
    pub focus: CollectionFocus,
}

/// Documents plus non-fatal problems reported by a collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionBatch {
    pub documents: Vec<Document>,
    pub warnings: Vec<String>,
}

impl CollectionBatch {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            warnings: Vec::new(),
        }
    }
}

#[async_trait]
pub trait Collector: Send + Sync {
    fn name(&self) -> &str;

    /// Source type stamped on every document this collector returns.
    fn source_type(&self) -> SourceType;

    async fn collect(
        &self,
        request: &CollectionRequest,
    ) -> std::result::Result<CollectionBatch, CollectionError>;
}

/// One clause returned by the retrieval index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseHit {
    pub clause_id: String,
    /// In `[0, 1]`.
    pub similarity: f64,
    pub text: String,
    /// Category tag from clause metadata.
    #[serde(default)]
    pub category: Option<Category>,
    /// Explicit importance from clause metadata, if any.
    #[serde(default)]
    pub importance: Option<f64>,
}

/// Similarity search over the regulatory clause corpus.
///
/// Hits are ordered by descending similarity, ties by `clause_id`.
#[async_trait]
pub trait ClauseIndex: Send + Sync {
    async fn search(
        &self,
        query: &str,
        domain: &str,
        k: usize,
    ) -> std::result::Result<Vec<ClauseHit>, RetrievalError>;
}

/// Raw output of the qualitative judge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeOutput {
    pub verdict_label: String,
    pub rationale: String,
}

/// Drafts a qualitative judgment of evidence against one criterion.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(
        &self,
        evidence_text: &str,
        criterion_text: &str,
    ) -> std::result::Result<JudgeOutput, JudgeError>;
}

/// Renders the final report, returning where it was written.
///
/// Implementations must render every critical issue and at least one
/// citation per non-empty category.
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, payload: &ReportPayload) -> Result<String>;
}

/// The external services one pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub web: Arc<dyn Collector>,
    pub specialized: Arc<dyn Collector>,
    pub clauses: Arc<dyn ClauseIndex>,
    pub judge: Arc<dyn Judge>,
    pub renderer: Arc<dyn ReportRenderer>,
}
