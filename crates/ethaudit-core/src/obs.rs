//! Structured lifecycle events for evaluation runs.
//!
//! Every event carries an `event` field (`run.started`, `stage.entered`, ...)
//! so JSON logs can be filtered without parsing messages.

use tracing::{info, warn};

/// Span tagged with the run id; async code attaches it with `Instrument`.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("ethaudit.run", run_id = %run_id)
}

pub fn emit_run_started(run_id: &str, company_name: &str, domain: &str) {
    info!(event = "run.started", run_id = %run_id, company = %company_name, domain = %domain);
}

pub fn emit_stage_entered(run_id: &str, stage: &str, version: u64) {
    info!(event = "stage.entered", run_id = %run_id, stage = %stage, version = version);
}

pub fn emit_stage_completed(run_id: &str, stage: &str, duration_ms: u64, documents: usize) {
    info!(
        event = "stage.completed",
        run_id = %run_id,
        stage = %stage,
        duration_ms = duration_ms,
        documents = documents,
    );
}

pub fn emit_gate_evaluated(run_id: &str, point: &str, sufficient: bool, decision: &str) {
    info!(
        event = "gate.evaluated",
        run_id = %run_id,
        point = %point,
        sufficient = sufficient,
        decision = %decision,
    );
}

pub fn emit_retry_scheduled(run_id: &str, retry_count: u32, max_retries: u32) {
    info!(
        event = "retry.scheduled",
        run_id = %run_id,
        retry_count = retry_count,
        max_retries = max_retries,
    );
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, ethics_score: Option<u8>, retries: u32) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        ethics_score = ethics_score.map(i64::from).unwrap_or(-1),
        retries = retries,
    );
}

pub fn emit_run_failed(run_id: &str, stage: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.failed", run_id = %run_id, stage = %stage, error = %error);
}

pub fn emit_collector_degraded(run_id: &str, collector: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "collector.degraded", run_id = %run_id, collector = %collector, reason = %reason);
}
