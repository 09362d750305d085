//! Bounded retry controller.
//!
//! Turns a sufficiency verdict into a [`GateDecision`]. Insufficiency routes
//! back to collection while `retry_count < max_retries`; after that the run
//! proceeds best-effort and a limitation is recorded. Every decision is kept
//! on the run state as an auditable [`RetryDecision`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Category, CollectionFocus, RunState, MAX_RETRIES};
use crate::fsm::GateDecision;
use crate::gate::{GatePoint, SufficiencyVerdict};

/// Limitation recorded when a run proceeds on insufficient evidence.
pub const INSUFFICIENT_EVIDENCE: &str =
    "insufficient evidence: evaluation proceeded best-effort after exhausting retries";

/// One auditable decision in the retry timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryDecision {
    pub point: GatePoint,
    /// `retry_count` at the time of the decision.
    pub retry_count: u32,
    pub decision: GateDecision,
    pub rationale: String,
    pub violations: Vec<String>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryController {
    max_retries: u32,
}

impl RetryController {
    /// `max_retries` is clamped to [`MAX_RETRIES`].
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.min(MAX_RETRIES),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Pure routing decision.
    pub fn decide(&self, verdict: &SufficiencyVerdict, retry_count: u32) -> GateDecision {
        if verdict.sufficient() {
            GateDecision::Proceed
        } else if retry_count < self.max_retries {
            GateDecision::Retry
        } else {
            GateDecision::ProceedBestEffort
        }
    }

    /// Decide and apply the decision to the run.
    pub fn apply(&self, mut run: RunState, verdict: &SufficiencyVerdict) -> (RunState, GateDecision) {
        let decision = self.decide(verdict, run.retry_count);
        let rationale = match decision {
            GateDecision::Proceed => "all sufficiency rules held".to_string(),
            GateDecision::Retry => format!(
                "insufficient at {}; retry {} of {}",
                verdict.point.as_str(),
                run.retry_count + 1,
                self.max_retries
            ),
            GateDecision::ProceedBestEffort => format!(
                "insufficient at {}; {} retries exhausted",
                verdict.point.as_str(),
                run.retry_count
            ),
        };
        run.retry_log.push(RetryDecision {
            point: verdict.point,
            retry_count: run.retry_count,
            decision,
            rationale,
            violations: verdict.reasons(),
            decided_at: Utc::now(),
        });

        let run = match decision {
            GateDecision::Proceed => run,
            GateDecision::Retry => schedule_retry(run),
            GateDecision::ProceedBestEffort => record_best_effort(run, verdict),
        };
        (run, decision)
    }
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(MAX_RETRIES)
    }
}

/// Prepare the run for another collection pass.
///
/// Only the per-attempt quality flags reset; merged documents, criteria and
/// logs carry over.
fn schedule_retry(mut run: RunState) -> RunState {
    run.retry_count += 1;
    run.is_data_sufficient = false;
    run.quality_score = None;
    run.collection_focus = collection_focus(&run);
    run
}

fn record_best_effort(mut run: RunState, verdict: &SufficiencyVerdict) -> RunState {
    run.limit(INSUFFICIENT_EVIDENCE);
    for reason in verdict.reasons() {
        run.warn_once(format!("proceeding best-effort: {reason}"));
    }
    run
}

/// Categories lacking evidence and weak quality facets, as query hints.
fn collection_focus(run: &RunState) -> CollectionFocus {
    let categories: Vec<Category> = match &run.analysis_result {
        Some(analysis) => analysis.uncovered_categories.clone(),
        None => Category::ALL.to_vec(),
    };
    let facets = run
        .quality
        .as_ref()
        .map(|q| q.weak_facets.clone())
        .unwrap_or_default();
    CollectionFocus { categories, facets }
}
