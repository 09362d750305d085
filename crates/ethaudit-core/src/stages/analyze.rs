use std::time::Instant;

use crate::analysis::{self, AnalysisResult};
use crate::config::EngineConfig;
use crate::domain::{ErrorImpact, ErrorLog, RunStage, RunState};

/// Derive the analysis result and score from merged documents.
///
/// Malformed evidence zeroes the analysis score and is recorded as a
/// recovered error.
pub fn analyze(mut run: RunState, config: &EngineConfig) -> RunState {
    let started = Instant::now();
    let result = match analysis::analyze(&run.merged_documents) {
        Ok(result) => result,
        Err(e) => {
            run.warn(format!("analysis degraded: {e}"));
            run.record_error(ErrorLog::new(
                RunStage::Analysis.as_str(),
                &e,
                true,
                ErrorImpact::High,
            ));
            AnalysisResult::empty()
        }
    };
    run.analysis_score = result.analysis_score;
    run.is_analysis_sufficient = result.analysis_score >= config.thresholds.analysis;
    run.analysis_result = Some(result);

    let processed = run.merged_documents.len();
    run.log_execution(RunStage::Analysis, "analyze evidence", started, processed);
    run
}
