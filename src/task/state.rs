use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::VerifaiError;

/// Lifecycle phase of a task, derived from its rubric and iterations.
///
/// Each task flows through: CREATED → AWAITING_ITERATION (repeated) → COMPLETED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPhase {
    /// No rubric established yet.
    Created,
    /// Rubric known, at least one iteration unresolved.
    AwaitingIteration,
    /// Every iteration resolved.
    Completed,
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPhase::Created => write!(f, "CREATED"),
            TaskPhase::AwaitingIteration => write!(f, "AWAITING_ITERATION"),
            TaskPhase::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// The single result of one evidence submission.
#[derive(Debug)]
pub enum EvaluationOutcome {
    /// The evidence showed sufficient progress. `is_final` is set when this
    /// pass resolved the last iteration; `clear_error` holds the gateway
    /// failure if the restrictions could not be lifted afterwards.
    Passed {
        is_final: bool,
        description: String,
        clear_error: Option<VerifaiError>,
    },
    /// Not enough progress; the iteration stays open for another attempt.
    Failed { description: String },
    /// Nothing was changed on the task.
    Error(VerifaiError),
}
