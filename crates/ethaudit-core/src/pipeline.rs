//! Run orchestration.
//!
//! [`Pipeline::execute`] drives a run through the state machine with an
//! explicit step budget: each iteration executes the current stage, feeds
//! the resulting event to [`transition`], and checkpoints the new state.
//! Fatal errors move the run to `failed` and still produce a report stub.

use std::sync::Arc;

use chrono::Utc;
use ethaudit_state::{RunStore, StorageError};
use tracing::{debug, Instrument};

use crate::collaborators::Collaborators;
use crate::config::EngineConfig;
use crate::domain::{ErrorImpact, ErrorLog, EthauditError, Result, RunStage, RunState};
use crate::fsm::{step_budget, transition, GateDecision, StageEvent};
use crate::gate::{evaluate_gate, GatePoint};
use crate::metrics::METRICS;
use crate::obs;
use crate::retry::RetryController;
use crate::stages::{self, StageFailure};

pub struct Pipeline {
    collaborators: Collaborators,
    store: Arc<dyn RunStore>,
    config: EngineConfig,
    retry: RetryController,
}

fn storage_error(e: StorageError) -> EthauditError {
    match e {
        StorageError::RunNotFound { run_id } => EthauditError::RunNotFound(run_id),
        StorageError::DigestMismatch {
            expected, actual, ..
        } => EthauditError::DigestMismatch { expected, actual },
        other => EthauditError::Storage(other),
    }
}

impl Pipeline {
    pub fn new(
        collaborators: Collaborators,
        store: Arc<dyn RunStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let retry = RetryController::new(config.max_retries);
        Ok(Self {
            collaborators,
            store,
            config,
            retry,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create and execute a new run.
    pub async fn run(&self, company_name: &str, domain: &str) -> Result<RunState> {
        let run = RunState::new(company_name, domain);
        self.checkpoint(&run).await?;
        self.execute(run).await
    }

    /// Continue a persisted run from its latest checkpoint.
    ///
    /// Terminal runs are returned unchanged.
    pub async fn resume(&self, run_id: &str) -> Result<RunState> {
        let checkpoint = self.store.latest(run_id).await.map_err(storage_error)?;
        let run: RunState = serde_json::from_value(checkpoint.state)?;
        debug!(
            run_id = %run_id,
            seq = checkpoint.meta.seq,
            stage = %run.current_stage,
            "resuming from checkpoint"
        );
        if run.is_terminal() {
            return Ok(run);
        }
        self.execute(run).await
    }

    /// Drive `run` until it reaches `done` or `failed`.
    pub async fn execute(&self, run: RunState) -> Result<RunState> {
        let span = obs::run_span(&run.run_key());
        self.execute_inner(run).instrument(span).await
    }

    async fn execute_inner(&self, mut run: RunState) -> Result<RunState> {
        let budget = step_budget(self.retry.max_retries());
        let mut steps = 0u32;

        while !run.is_terminal() {
            if steps >= budget {
                return self
                    .fail(run, EthauditError::StepBudgetExceeded { budget })
                    .await;
            }
            steps += 1;

            let from = run.current_stage;
            let (next_run, event) = match self.step(run).await {
                Ok(stepped) => stepped,
                Err(failure) => return self.fail(*failure.run, failure.error).await,
            };
            run = next_run;

            let to = match transition(from, event) {
                Ok(to) => to,
                Err(e) => return self.fail(run, e).await,
            };
            run = run.enter(to);
            obs::emit_stage_entered(&run.run_key(), to.as_str(), run.version);
            self.checkpoint(&run).await?;
        }

        let elapsed = (Utc::now() - run.started_at).num_milliseconds().max(0) as u64;
        obs::emit_run_finished(
            &run.run_key(),
            elapsed,
            run.final_score.as_ref().map(|s| s.ethics_score),
            run.retry_count,
        );
        METRICS.flush();
        Ok(run)
    }

    /// Execute the current stage and report the event it produced.
    async fn step(
        &self,
        run: RunState,
    ) -> std::result::Result<(RunState, StageEvent), StageFailure> {
        let stage = run.current_stage;
        let started = std::time::Instant::now();
        let key = run.run_key();

        let (run, event) = match stage {
            RunStage::Init => {
                METRICS.inc_runs_started();
                obs::emit_run_started(&key, run.company_name(), run.domain());
                (run, StageEvent::Start)
            }
            RunStage::Collection => {
                let run = stages::collect(run, &self.collaborators, &self.config).await;
                (run, StageEvent::Collected)
            }
            RunStage::Analysis => {
                let run = stages::analyze(run, &self.config);
                let (run, decision) = self.gate(run, GatePoint::AfterAnalysis);
                (run, StageEvent::Analyzed(decision))
            }
            RunStage::Evaluation => {
                let run = stages::evaluate(run, &self.collaborators, &self.config).await?;
                let (run, decision) = self.gate(run, GatePoint::AfterEvaluation);
                (run, StageEvent::Evaluated(decision))
            }
            RunStage::Report => {
                let run = stages::report(run, self.collaborators.renderer.as_ref()).await;
                (run, StageEvent::Reported)
            }
            RunStage::Done | RunStage::Failed => {
                let error = EthauditError::InvalidTransition {
                    from: stage.to_string(),
                    event: "step".to_string(),
                };
                return Err(StageFailure::new(run, error));
            }
        };

        obs::emit_stage_completed(
            &key,
            stage.as_str(),
            started.elapsed().as_millis() as u64,
            run.merged_documents.len(),
        );
        Ok((run, event))
    }

    fn gate(&self, run: RunState, point: GatePoint) -> (RunState, GateDecision) {
        let verdict = evaluate_gate(
            point,
            &run,
            &self.config.thresholds,
            self.config.recheck_after_evaluation,
        );
        let (run, decision) = self.retry.apply(run, &verdict);
        obs::emit_gate_evaluated(
            &run.run_key(),
            point.as_str(),
            verdict.sufficient(),
            decision.as_str(),
        );
        if decision == GateDecision::Retry {
            METRICS.inc_retries();
            obs::emit_retry_scheduled(&run.run_key(), run.retry_count, self.retry.max_retries());
        }
        (run, decision)
    }

    async fn fail(&self, mut run: RunState, error: EthauditError) -> Result<RunState> {
        let stage = run.current_stage;
        obs::emit_run_failed(&run.run_key(), stage.as_str(), &error);
        METRICS.inc_runs_failed();

        run.record_error(ErrorLog::new(
            stage.as_str(),
            &error,
            false,
            ErrorImpact::High,
        ));
        let failed = transition(stage, StageEvent::Abort).unwrap_or(RunStage::Failed);
        run = run.enter(failed);
        run = stages::report_failure(run, self.collaborators.renderer.as_ref(), &error).await;
        self.checkpoint(&run).await?;
        METRICS.flush();
        Ok(run)
    }

    async fn checkpoint(&self, run: &RunState) -> Result<()> {
        let state = serde_json::to_value(run)?;
        let meta = self
            .store
            .save(&run.run_key(), run.current_stage.as_str(), &state)
            .await?;
        debug!(seq = meta.seq, stage = %meta.stage, digest = %meta.digest.short(), "checkpoint saved");
        Ok(())
    }
}
