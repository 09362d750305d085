//! Stage executors.
//!
//! Each executor takes the run state by value and returns the updated state.
//! Collection and analysis never fail; evaluation fails only on retrieval or
//! aggregation errors and hands the partially updated run back with the error.

mod analyze;
mod collect;
mod evaluate;
mod report;

pub use analyze::analyze;
pub use collect::collect;
pub use evaluate::evaluate;
pub use report::{report, report_failure};

use crate::domain::{EthauditError, RunState};

/// A fatal stage error together with the run it interrupted.
#[derive(Debug)]
pub struct StageFailure {
    pub run: Box<RunState>,
    pub error: EthauditError,
}

impl StageFailure {
    pub fn new(run: RunState, error: impl Into<EthauditError>) -> Self {
        Self {
            run: Box::new(run),
            error: error.into(),
        }
    }
}
