//! Deterministic in-process collaborators for tests and demos.
//!
//! None of these perform I/O. [`TestCollaborators`] assembles a full
//! [`Collaborators`] bundle with sensible defaults that individual tests
//! override.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::collaborators::{
    ClauseHit, ClauseIndex, CollectionBatch, CollectionRequest, Collaborators, Collector, Judge,
    JudgeOutput, ReportRenderer,
};
use crate::domain::{
    Category, CollectionError, Document, EthauditError, JudgeError, Result, RetrievalError,
    SourceType,
};
use crate::report::ReportPayload;

/// Returns the same documents on every pass.
pub struct StaticCollector {
    name: String,
    source_type: SourceType,
    documents: Vec<Document>,
    requests: Mutex<Vec<CollectionRequest>>,
}

impl StaticCollector {
    pub fn new(name: impl Into<String>, source_type: SourceType, documents: Vec<Document>) -> Self {
        Self {
            name: name.into(),
            source_type,
            documents,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn web(documents: Vec<Document>) -> Self {
        Self::new("web", SourceType::Web, documents)
    }

    pub fn specialized(documents: Vec<Document>) -> Self {
        Self::new("specialized", SourceType::Specialized, documents)
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CollectionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Collector for StaticCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> SourceType {
        self.source_type
    }

    async fn collect(
        &self,
        request: &CollectionRequest,
    ) -> std::result::Result<CollectionBatch, CollectionError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(CollectionBatch::new(self.documents.clone()))
    }
}

/// Plays back one scripted outcome per pass; empty once the script runs out.
pub struct ScriptedCollector {
    name: String,
    source_type: SourceType,
    script: Vec<std::result::Result<Vec<Document>, CollectionError>>,
    calls: AtomicUsize,
}

impl ScriptedCollector {
    pub fn new(
        name: impl Into<String>,
        source_type: SourceType,
        script: Vec<std::result::Result<Vec<Document>, CollectionError>>,
    ) -> Self {
        Self {
            name: name.into(),
            source_type,
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Collector for ScriptedCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> SourceType {
        self.source_type
    }

    async fn collect(
        &self,
        _request: &CollectionRequest,
    ) -> std::result::Result<CollectionBatch, CollectionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.get(call) {
            Some(Ok(documents)) => Ok(CollectionBatch::new(documents.clone())),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(CollectionBatch::default()),
        }
    }
}

/// Always unavailable.
pub struct FailingCollector {
    name: String,
}

impl FailingCollector {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Collector for FailingCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> SourceType {
        SourceType::Web
    }

    async fn collect(
        &self,
        _request: &CollectionRequest,
    ) -> std::result::Result<CollectionBatch, CollectionError> {
        Err(CollectionError::Unavailable {
            collector: self.name.clone(),
            reason: "connection refused".to_string(),
        })
    }
}

/// Sleeps before answering; pair with a paused tokio clock.
pub struct SlowCollector {
    delay: Duration,
}

impl SlowCollector {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Collector for SlowCollector {
    fn name(&self) -> &str {
        "slow"
    }

    fn source_type(&self) -> SourceType {
        SourceType::Web
    }

    async fn collect(
        &self,
        _request: &CollectionRequest,
    ) -> std::result::Result<CollectionBatch, CollectionError> {
        tokio::time::sleep(self.delay).await;
        Ok(CollectionBatch::default())
    }
}

/// Shorthand for a tagged clause hit.
pub fn clause(id: &str, similarity: f64, category: Category) -> ClauseHit {
    ClauseHit {
        clause_id: id.to_string(),
        similarity,
        text: format!("{id}: providers of high-risk systems shall meet {category} obligations"),
        category: Some(category),
        importance: None,
    }
}

/// Returns its fixed hits for every query, ranked and truncated to `k`.
pub struct StaticClauseIndex {
    hits: Vec<ClauseHit>,
}

impl StaticClauseIndex {
    pub fn new(hits: Vec<ClauseHit>) -> Self {
        Self { hits }
    }

    /// One clause per category.
    pub fn one_per_category() -> Self {
        Self::new(
            Category::ALL
                .iter()
                .enumerate()
                .map(|(i, c)| clause(&format!("art-{}", i + 1), 0.8, *c))
                .collect(),
        )
    }
}

#[async_trait]
impl ClauseIndex for StaticClauseIndex {
    async fn search(
        &self,
        _query: &str,
        _domain: &str,
        k: usize,
    ) -> std::result::Result<Vec<ClauseHit>, RetrievalError> {
        let mut hits = self.hits.clone();
        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.clause_id.cmp(&b.clause_id))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

/// Always unavailable.
pub struct FailingClauseIndex;

#[async_trait]
impl ClauseIndex for FailingClauseIndex {
    async fn search(
        &self,
        _query: &str,
        _domain: &str,
        _k: usize,
    ) -> std::result::Result<Vec<ClauseHit>, RetrievalError> {
        Err(RetrievalError::IndexUnavailable(
            "corpus snapshot missing".to_string(),
        ))
    }
}

/// Answers every criterion with the same verdict label.
pub struct FixedJudge {
    label: String,
    calls: AtomicUsize,
}

impl FixedJudge {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Judge for FixedJudge {
    async fn judge(
        &self,
        _evidence_text: &str,
        criterion_text: &str,
    ) -> std::result::Result<JudgeOutput, JudgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(JudgeOutput {
            verdict_label: self.label.clone(),
            rationale: format!("Fixed verdict for: {criterion_text}"),
        })
    }
}

/// Always unavailable.
pub struct FailingJudge;

#[async_trait]
impl Judge for FailingJudge {
    async fn judge(
        &self,
        _evidence_text: &str,
        _criterion_text: &str,
    ) -> std::result::Result<JudgeOutput, JudgeError> {
        Err(JudgeError::Unavailable("model endpoint down".to_string()))
    }
}

/// Keeps every payload in memory instead of writing files.
#[derive(Default)]
pub struct RecordingRenderer {
    payloads: Mutex<Vec<ReportPayload>>,
    fail: bool,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            payloads: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn payloads(&self) -> Vec<ReportPayload> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportRenderer for RecordingRenderer {
    async fn render(&self, payload: &ReportPayload) -> Result<String> {
        if self.fail {
            return Err(EthauditError::Render("disk full".to_string()));
        }
        self.payloads.lock().unwrap().push(payload.clone());
        Ok(format!("memory://{}.md", payload.run_id))
    }
}

/// Builder for a [`Collaborators`] bundle.
pub struct TestCollaborators {
    web: Arc<dyn Collector>,
    specialized: Arc<dyn Collector>,
    clauses: Arc<dyn ClauseIndex>,
    judge: Arc<dyn Judge>,
    renderer: Arc<dyn ReportRenderer>,
}

impl TestCollaborators {
    /// Empty collectors, one clause per category, a `partially_compliant`
    /// judge and a recording renderer.
    pub fn new() -> Self {
        Self {
            web: Arc::new(StaticCollector::web(Vec::new())),
            specialized: Arc::new(StaticCollector::specialized(Vec::new())),
            clauses: Arc::new(StaticClauseIndex::one_per_category()),
            judge: Arc::new(FixedJudge::new("partially_compliant")),
            renderer: Arc::new(RecordingRenderer::new()),
        }
    }

    pub fn web(mut self, collector: Arc<dyn Collector>) -> Self {
        self.web = collector;
        self
    }

    pub fn specialized(mut self, collector: Arc<dyn Collector>) -> Self {
        self.specialized = collector;
        self
    }

    pub fn clauses(mut self, index: Arc<dyn ClauseIndex>) -> Self {
        self.clauses = index;
        self
    }

    pub fn judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.judge = judge;
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn ReportRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn build(self) -> Collaborators {
        Collaborators {
            web: self.web,
            specialized: self.specialized,
            clauses: self.clauses,
            judge: self.judge,
            renderer: self.renderer,
        }
    }
}

impl Default for TestCollaborators {
    fn default() -> Self {
        Self::new()
    }
}

/// Default bundle with the given collectors.
pub fn collaborators_with(web: Arc<dyn Collector>, specialized: Arc<dyn Collector>) -> Collaborators {
    TestCollaborators::new().web(web).specialized(specialized).build()
}
