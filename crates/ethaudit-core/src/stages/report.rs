use std::time::Instant;

use crate::collaborators::ReportRenderer;
use crate::domain::{ErrorImpact, ErrorLog, EthauditError, RunStage, RunState};
use crate::report::{build_source_summary, ReportPayload, ReportStatus};

async fn render(mut run: RunState, renderer: &dyn ReportRenderer, status: ReportStatus) -> RunState {
    let started = Instant::now();
    run.source_summary = Some(build_source_summary(&run));
    let payload = ReportPayload::from_run(&run, status);
    match renderer.render(&payload).await {
        Ok(path) => run.report_path = Some(path),
        Err(e) => {
            let e = match e {
                EthauditError::Render(_) => e,
                other => EthauditError::Render(other.to_string()),
            };
            run.warn(format!("report not written: {e}"));
            run.record_error(ErrorLog::new(
                RunStage::Report.as_str(),
                &e,
                false,
                ErrorImpact::None,
            ));
        }
    }
    let cited = run
        .source_summary
        .as_ref()
        .map(|s| s.citations.len())
        .unwrap_or(0);
    run.log_execution(RunStage::Report, "render report", started, cited);
    run
}

/// Build the source summary and hand the final score to the renderer.
///
/// A renderer failure leaves `report_path` unset and is recorded; it does not
/// fail the run.
pub async fn report(run: RunState, renderer: &dyn ReportRenderer) -> RunState {
    render(run, renderer, ReportStatus::Complete).await
}

/// Render the stub report for a run that failed on `error`.
pub async fn report_failure(
    run: RunState,
    renderer: &dyn ReportRenderer,
    error: &EthauditError,
) -> RunState {
    render(
        run,
        renderer,
        ReportStatus::Failed {
            blocking_error: error.to_string(),
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RetrievalError;
    use crate::fakes::RecordingRenderer;

    #[tokio::test]
    async fn report_sets_path_and_summary() {
        let renderer = RecordingRenderer::new();
        let run = report(RunState::new("Acme", "medical"), &renderer).await;
        assert!(run.report_path.is_some());
        assert!(run.source_summary.is_some());
        assert_eq!(renderer.payloads().len(), 1);
        assert_eq!(renderer.payloads()[0].status, ReportStatus::Complete);
    }

    #[tokio::test]
    async fn failure_stub_carries_blocking_error() {
        let renderer = RecordingRenderer::new();
        let error = EthauditError::from(RetrievalError::IndexUnavailable("offline".into()));
        let run = report_failure(RunState::new("Acme", "medical"), &renderer, &error).await;
        assert!(run.report_path.is_some());
        match &renderer.payloads()[0].status {
            ReportStatus::Failed { blocking_error } => assert!(blocking_error.contains("offline")),
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[tokio::test]
    async fn renderer_errors_are_recorded() {
        let renderer = RecordingRenderer::failing();
        let run = report(RunState::new("Acme", "medical"), &renderer).await;
        assert!(run.report_path.is_none());
        assert_eq!(run.errors.len(), 1);
        assert!(run.warnings[0].contains("report not written"));
    }
}
