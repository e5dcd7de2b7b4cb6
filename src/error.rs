use thiserror::Error;

use crate::grok::GrokError;

#[derive(Debug, Error)]
pub enum VerifaiError {
    #[error("Model call failed: {0}")]
    Grok(#[from] GrokError),

    #[error("Model response is missing the <{0}> field")]
    MissingTag(String),

    #[error("Invalid verdict value: {0:?} (expected \"yes\" or \"no\")")]
    InvalidVerdict(String),

    #[error("Task has no pending iteration; it is already complete")]
    NoPendingIteration,

    #[error("Task has no rubric yet. Run `verifai rubric` first.")]
    RubricMissing,

    #[error("A task is already active. Finish it or run `verifai abandon`.")]
    TaskExists,

    #[error("No active task. Run `verifai new` first.")]
    NoTask,

    #[error("Stored task is corrupt: {0}")]
    CorruptRecord(String),

    #[error("Restriction gateway error: {0}")]
    Restriction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = VerifaiError> = std::result::Result<T, E>;
