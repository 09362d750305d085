//! Run state machine.
//!
//! `transition` is a pure function over [`RunStage`] and [`StageEvent`]. The
//! only backward edges are the two `Retry` routes into collection, and those
//! are only ever produced by the retry controller while retries remain, so
//! every run terminates within [`step_budget`] transitions.

use serde::{Deserialize, Serialize};

use crate::domain::{EthauditError, Result, RunStage};

/// Outcome of a sufficiency gate as seen by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    /// Evidence is sufficient.
    Proceed,
    /// Evidence is insufficient but retries are exhausted.
    ProceedBestEffort,
    /// Evidence is insufficient and a retry remains: re-enter collection.
    Retry,
}

impl GateDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            GateDecision::Proceed => "proceed",
            GateDecision::ProceedBestEffort => "proceed_best_effort",
            GateDecision::Retry => "retry",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageEvent {
    Start,
    Collected,
    Analyzed(GateDecision),
    Evaluated(GateDecision),
    Reported,
    /// Unrecoverable error.
    Abort,
}

impl std::fmt::Display for StageEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageEvent::Start => f.write_str("start"),
            StageEvent::Collected => f.write_str("collected"),
            StageEvent::Analyzed(d) => write!(f, "analyzed({})", d.as_str()),
            StageEvent::Evaluated(d) => write!(f, "evaluated({})", d.as_str()),
            StageEvent::Reported => f.write_str("reported"),
            StageEvent::Abort => f.write_str("abort"),
        }
    }
}

pub fn transition(from: RunStage, event: StageEvent) -> Result<RunStage> {
    use GateDecision::*;
    use RunStage::*;

    let next = match (from, event) {
        (Init, StageEvent::Start) => Collection,
        (Collection, StageEvent::Collected) => Analysis,
        (Analysis, StageEvent::Analyzed(Proceed | ProceedBestEffort)) => Evaluation,
        (Analysis, StageEvent::Analyzed(Retry)) => Collection,
        (Evaluation, StageEvent::Evaluated(Proceed | ProceedBestEffort)) => Report,
        (Evaluation, StageEvent::Evaluated(Retry)) => Collection,
        (Report, StageEvent::Reported) => Done,
        (stage, StageEvent::Abort) if !stage.is_terminal() => Failed,
        (stage, event) => {
            return Err(EthauditError::InvalidTransition {
                from: stage.to_string(),
                event: event.to_string(),
            })
        }
    };
    Ok(next)
}

/// Upper bound on transitions for a run allowed `max_retries` back-edges.
///
/// Each collection pass costs at most three transitions (collected, analyzed,
/// evaluated); start, reported and abort add three more.
pub fn step_budget(max_retries: u32) -> u32 {
    3 + 3 * (max_retries + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MAX_RETRIES;

    #[test]
    fn happy_path_reaches_done() {
        let mut stage = RunStage::Init;
        for event in [
            StageEvent::Start,
            StageEvent::Collected,
            StageEvent::Analyzed(GateDecision::Proceed),
            StageEvent::Evaluated(GateDecision::Proceed),
            StageEvent::Reported,
        ] {
            stage = transition(stage, event).unwrap();
        }
        assert_eq!(stage, RunStage::Done);
    }

    #[test]
    fn retry_routes_back_to_collection() {
        assert_eq!(
            transition(RunStage::Analysis, StageEvent::Analyzed(GateDecision::Retry)).unwrap(),
            RunStage::Collection
        );
        assert_eq!(
            transition(RunStage::Evaluation, StageEvent::Evaluated(GateDecision::Retry)).unwrap(),
            RunStage::Collection
        );
    }

    #[test]
    fn best_effort_moves_forward() {
        assert_eq!(
            transition(
                RunStage::Analysis,
                StageEvent::Analyzed(GateDecision::ProceedBestEffort)
            )
            .unwrap(),
            RunStage::Evaluation
        );
    }

    #[test]
    fn abort_fails_any_live_stage() {
        for stage in [
            RunStage::Init,
            RunStage::Collection,
            RunStage::Analysis,
            RunStage::Evaluation,
            RunStage::Report,
        ] {
            assert_eq!(transition(stage, StageEvent::Abort).unwrap(), RunStage::Failed);
        }
    }

    #[test]
    fn terminal_stages_accept_nothing() {
        for stage in [RunStage::Done, RunStage::Failed] {
            for event in [StageEvent::Start, StageEvent::Abort, StageEvent::Reported] {
                assert!(matches!(
                    transition(stage, event),
                    Err(EthauditError::InvalidTransition { .. })
                ));
            }
        }
    }

    #[test]
    fn out_of_order_events_are_rejected() {
        assert!(transition(RunStage::Init, StageEvent::Collected).is_err());
        assert!(transition(RunStage::Collection, StageEvent::Reported).is_err());
        assert!(transition(
            RunStage::Evaluation,
            StageEvent::Analyzed(GateDecision::Proceed)
        )
        .is_err());
    }

    #[test]
    fn worst_case_retry_path_fits_budget() {
        // Every pass retries after evaluation until retries run out.
        let mut stage = transition(RunStage::Init, StageEvent::Start).unwrap();
        let mut steps = 1;
        let mut retries = 0;
        loop {
            stage = transition(stage, StageEvent::Collected).unwrap();
            stage = transition(stage, StageEvent::Analyzed(GateDecision::ProceedBestEffort)).unwrap();
            steps += 2;
            let decision = if retries < MAX_RETRIES {
                GateDecision::Retry
            } else {
                GateDecision::ProceedBestEffort
            };
            stage = transition(stage, StageEvent::Evaluated(decision)).unwrap();
            steps += 1;
            if decision == GateDecision::Retry {
                retries += 1;
                continue;
            }
            break;
        }
        stage = transition(stage, StageEvent::Reported).unwrap();
        steps += 1;
        assert_eq!(stage, RunStage::Done);
        assert!(steps <= step_budget(MAX_RETRIES));
    }
}
