//! Report payload, source summary and the Markdown renderer.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collaborators::ReportRenderer;
use crate::domain::{
    Category, Criterion, CriterionEvaluation, FinalScore, ReliabilityTier, Result, RunState,
};

/// One cited document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source_id: String,
    pub url_or_ref: String,
    pub title: String,
    pub tier: ReliabilityTier,
    pub published_at: Option<DateTime<Utc>>,
    /// Categories whose evaluations cite this document.
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub all_document_ids: Vec<String>,
    /// Document ids touched per stage (`collection`, `analysis`, `evaluation`).
    pub documents_by_stage: BTreeMap<String, Vec<String>>,
    /// Documents cited by at least one evaluation, by source id.
    pub citations: Vec<Citation>,
}

impl SourceSummary {
    pub fn citation(&self, source_id: &str) -> Option<&Citation> {
        self.citations.iter().find(|c| c.source_id == source_id)
    }
}

pub fn build_source_summary(run: &RunState) -> SourceSummary {
    let all_document_ids = run.merged_documents.source_ids();

    let analysed: Vec<String> = run
        .analysis_result
        .as_ref()
        .map(|a| {
            a.documents_by_category
                .values()
                .flatten()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        })
        .unwrap_or_default();

    let mut cited: BTreeMap<String, BTreeSet<Category>> = BTreeMap::new();
    for eval in &run.evaluations {
        for id in &eval.evidence_refs {
            cited.entry(id.clone()).or_default().insert(eval.category);
        }
    }

    let citations = cited
        .iter()
        .filter_map(|(id, categories)| {
            let doc = run.merged_documents.find_by_source_id(id)?;
            Some(Citation {
                source_id: doc.source_id.clone(),
                url_or_ref: doc.url_or_ref.clone(),
                title: doc.title.clone(),
                tier: doc.tier(),
                published_at: doc.published_at,
                categories: categories.iter().copied().collect(),
            })
        })
        .collect();

    let mut documents_by_stage = BTreeMap::new();
    documents_by_stage.insert("collection".to_string(), all_document_ids.clone());
    documents_by_stage.insert("analysis".to_string(), analysed);
    documents_by_stage.insert("evaluation".to_string(), cited.keys().cloned().collect());

    SourceSummary {
        all_document_ids,
        documents_by_stage,
        citations,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportStatus {
    Complete,
    Failed { blocking_error: String },
}

/// Everything a renderer receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub run_id: String,
    pub company_name: String,
    pub domain: String,
    pub generated_at: DateTime<Utc>,
    pub status: ReportStatus,
    pub final_score: Option<FinalScore>,
    pub criteria: Vec<Criterion>,
    pub evaluations: Vec<CriterionEvaluation>,
    pub source_summary: SourceSummary,
    pub quality_score: Option<f64>,
    pub retry_count: u32,
    pub limitations: Vec<String>,
    pub warnings: Vec<String>,
}

impl ReportPayload {
    pub fn from_run(run: &RunState, status: ReportStatus) -> Self {
        Self {
            run_id: run.run_key(),
            company_name: run.company_name().to_string(),
            domain: run.domain().to_string(),
            generated_at: Utc::now(),
            status,
            final_score: run.final_score.clone(),
            criteria: run
                .criteria
                .as_ref()
                .map(|c| c.criteria.clone())
                .unwrap_or_default(),
            evaluations: run.evaluations.clone(),
            source_summary: run
                .source_summary
                .clone()
                .unwrap_or_else(|| build_source_summary(run)),
            quality_score: run.quality.as_ref().map(|q| q.quality_score),
            retry_count: run.retry_count,
            limitations: run.limitations.clone(),
            warnings: run.warnings.clone(),
        }
    }
}

fn cite(summary: &SourceSummary, source_id: &str) -> String {
    match summary.citation(source_id) {
        Some(c) => format!(
            "[{}]({}) ({} reliability)",
            if c.title.is_empty() { &c.source_id } else { &c.title },
            c.url_or_ref,
            c.tier.as_str()
        ),
        None => format!("`{source_id}`"),
    }
}

/// Render a payload to Markdown.
///
/// Every critical issue is listed, and every category with cited evidence
/// shows at least one citation.
pub fn render_markdown(payload: &ReportPayload) -> String {
    let mut out = String::new();
    out.push_str(&format!("# AI Ethics Risk Assessment: {}\n\n", payload.company_name));
    out.push_str(&format!("- Domain: {}\n", payload.domain));
    out.push_str(&format!("- Run: `{}`\n", payload.run_id));
    out.push_str(&format!("- Generated: {}\n", payload.generated_at.to_rfc3339()));
    out.push_str(&format!("- Collection retries: {}\n", payload.retry_count));
    if let Some(q) = payload.quality_score {
        out.push_str(&format!("- Data quality: {:.2}\n", q));
    }
    out.push('\n');

    if let ReportStatus::Failed { blocking_error } = &payload.status {
        out.push_str("## Evaluation failed\n\n");
        out.push_str(&format!(
            "The run stopped before a score could be produced. Blocking error:\n\n> {}\n\n",
            blocking_error
        ));
        render_notes(&mut out, payload);
        return out;
    }

    let Some(score) = &payload.final_score else {
        out.push_str("## No score\n\nThe run finished without a final score.\n\n");
        render_notes(&mut out, payload);
        return out;
    };

    out.push_str("## Summary\n\n");
    out.push_str(&format!("- Ethics score: **{}/100**\n", score.ethics_score));
    out.push_str(&format!("- Grade: **{}**\n", score.grade));
    out.push_str(&format!("- Risk level: **{}**\n", score.risk_level));
    out.push_str(&format!("- Overall confidence: {:.2}\n\n", score.overall_confidence));

    out.push_str("## Category scores\n\n| Category | Score | Confidence |\n|---|---|---|\n");
    for (category, value) in &score.category_scores {
        let confidence = score
            .confidence_by_category
            .get(category)
            .map(|c| format!("{c:.2}"))
            .unwrap_or_else(|| "n/a".to_string());
        out.push_str(&format!(
            "| {} | {:.0} | {} |\n",
            category.title(),
            value * 100.0,
            confidence
        ));
    }
    out.push('\n');

    out.push_str("## Critical issues\n\n");
    if score.critical_issues.is_empty() {
        out.push_str("None.\n\n");
    }
    for issue in &score.critical_issues {
        out.push_str(&format!(
            "- **{}** ({}): judgment {:.2}, confidence {:.2}, verdict {}. {}\n",
            issue.criterion_id,
            issue.category.title(),
            issue.judgment_score,
            issue.confidence,
            issue.verdict,
            issue.rationale
        ));
    }
    if !score.critical_issues.is_empty() {
        out.push('\n');
    }

    out.push_str("## Findings\n\n");
    let criteria: BTreeMap<&str, &Criterion> = payload
        .criteria
        .iter()
        .map(|c| (c.criterion_id.as_str(), c))
        .collect();
    for category in Category::ALL {
        let evals: Vec<&CriterionEvaluation> = payload
            .evaluations
            .iter()
            .filter(|e| e.category == category)
            .collect();
        if evals.is_empty() {
            continue;
        }
        out.push_str(&format!("### {}\n\n", category.title()));
        for eval in evals {
            let text = criteria
                .get(eval.criterion_id.as_str())
                .map(|c| c.text.as_str())
                .unwrap_or("");
            out.push_str(&format!(
                "- **{}** {} (judgment {:.2}, confidence {:.2})\n",
                eval.criterion_id, text, eval.judgment_score, eval.confidence
            ));
            if !eval.evidence_refs.is_empty() {
                let sources: Vec<String> = eval
                    .evidence_refs
                    .iter()
                    .map(|id| cite(&payload.source_summary, id))
                    .collect();
                out.push_str(&format!("  - Sources: {}\n", sources.join("; ")));
            }
        }
        out.push('\n');
    }

    render_notes(&mut out, payload);

    if !payload.source_summary.citations.is_empty() {
        out.push_str("## Sources\n\n");
        for c in &payload.source_summary.citations {
            out.push_str(&format!(
                "- `{}` {} <{}> ({} reliability)\n",
                c.source_id,
                c.title,
                c.url_or_ref,
                c.tier.as_str()
            ));
        }
        out.push('\n');
    }
    out
}

fn render_notes(out: &mut String, payload: &ReportPayload) {
    if !payload.limitations.is_empty() {
        out.push_str("## Limitations\n\n");
        for l in &payload.limitations {
            out.push_str(&format!("- {l}\n"));
        }
        out.push('\n');
    }
    if !payload.warnings.is_empty() {
        out.push_str("## Warnings\n\n");
        for w in &payload.warnings {
            out.push_str(&format!("- {w}\n"));
        }
        out.push('\n');
    }
    out.push_str("_This assessment is advisory and is not a legal certification._\n");
}

/// Writes `<report_dir>/<run_id>.md`.
#[derive(Debug, Clone)]
pub struct MarkdownReportRenderer {
    report_dir: PathBuf,
}

impl MarkdownReportRenderer {
    pub fn new(report_dir: impl AsRef<Path>) -> Self {
        Self {
            report_dir: report_dir.as_ref().to_path_buf(),
        }
    }

    pub fn report_path(&self, run_id: &str) -> PathBuf {
        self.report_dir.join(format!("{run_id}.md"))
    }
}

#[async_trait]
impl ReportRenderer for MarkdownReportRenderer {
    async fn render(&self, payload: &ReportPayload) -> Result<String> {
        tokio::fs::create_dir_all(&self.report_dir).await?;
        let path = self.report_path(&payload.run_id);
        tokio::fs::write(&path, render_markdown(payload)).await?;
        Ok(path.display().to_string())
    }
}
