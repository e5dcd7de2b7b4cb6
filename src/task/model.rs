use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::TaskPhase;

/// How strictly the model judges evidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Lenient,
    #[default]
    Regular,
    Extreme,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Lenient => write!(f, "lenient"),
            Difficulty::Regular => write!(f, "regular"),
            Difficulty::Extreme => write!(f, "extreme"),
        }
    }
}

/// One verification slot. `state` is unset until the slot passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iteration {
    pub state: Option<String>,
}

impl Iteration {
    pub fn is_resolved(&self) -> bool {
        self.state.is_some()
    }
}

/// A self-declared goal and its verification progress.
///
/// Iterations resolve strictly in order, so the resolved ones always form a
/// prefix of `iterations`. Mutation goes through the iteration engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub prompt: String,
    pub rubric: Option<String>,
    pub difficulty: Difficulty,
    pub iterations: Vec<Iteration>,
    pub start_time: Option<DateTime<Utc>>,
    /// Length of the active window before restrictions return.
    pub window_minutes: Option<u32>,
    pub restricting: bool,
    /// Iteration 0 holds the "before" photo description rather than evidence.
    #[serde(default)]
    pub has_baseline: bool,
}

impl Task {
    pub fn new(
        prompt: String,
        difficulty: Difficulty,
        iterations: usize,
        window_minutes: Option<u32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            prompt,
            rubric: None,
            difficulty,
            iterations: vec![Iteration::default(); iterations],
            start_time: Some(Utc::now()),
            window_minutes,
            restricting: false,
            has_baseline: false,
        }
    }

    /// Index of the first unresolved iteration.
    pub fn pointer(&self) -> Option<usize> {
        self.iterations.iter().position(|it| !it.is_resolved())
    }

    /// Recorded state of the iteration just before `index`, if any.
    pub fn previous_state(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|prev| self.iterations.get(prev))
            .and_then(|it| it.state.as_deref())
    }

    pub fn resolved_count(&self) -> usize {
        self.iterations.iter().filter(|it| it.is_resolved()).count()
    }

    /// Number of evidence checkpoints, not counting the baseline.
    pub fn checkpoint_total(&self) -> usize {
        self.iterations.len() - usize::from(self.has_baseline)
    }

    /// Checkpoints already passed, not counting the baseline.
    pub fn checkpoints_passed(&self) -> usize {
        self.resolved_count() - usize::from(self.has_baseline)
    }

    /// 1-based checkpoint number of the iteration at `index`.
    pub fn checkpoint_number(&self, index: usize) -> usize {
        index + 1 - usize::from(self.has_baseline)
    }

    pub fn is_complete(&self) -> bool {
        !self.iterations.is_empty() && self.pointer().is_none()
    }

    pub fn phase(&self) -> TaskPhase {
        if self.rubric.is_none() {
            TaskPhase::Created
        } else if self.is_complete() {
            TaskPhase::Completed
        } else {
            TaskPhase::AwaitingIteration
        }
    }

    /// True when no resolved iteration follows an unresolved one.
    pub fn has_resolved_prefix(&self) -> bool {
        match self.pointer() {
            Some(first_open) => self.iterations[first_open..]
                .iter()
                .all(|it| !it.is_resolved()),
            None => true,
        }
    }

    /// Minutes left in the active window; `None` once the task is complete or
    /// when it has no window.
    pub fn minutes_until_restricting(&self, now: DateTime<Utc>) -> Option<i64> {
        if self.is_complete() {
            return None;
        }
        let start = self.start_time?;
        let window = Duration::minutes(i64::from(self.window_minutes?));
        Some((start + window - now).num_minutes().max(0))
    }

    pub fn window_elapsed(&self, now: DateTime<Utc>) -> bool {
        match (self.start_time, self.window_minutes) {
            (Some(start), Some(minutes)) => now >= start + Duration::minutes(i64::from(minutes)),
            _ => false,
        }
    }

    /// Insert a resolved leading iteration describing the "before" photo.
    pub(crate) fn record_baseline(&mut self, state: String) {
        self.iterations.insert(0, Iteration { state: Some(state) });
        self.has_baseline = true;
    }

    pub(crate) fn record_pass(&mut self, index: usize, state: String) {
        self.iterations[index].state = Some(state);
        self.restricting = false;
    }

    /// Start a fresh active window at `now`.
    pub(crate) fn restart_window(&mut self, now: DateTime<Utc>) {
        self.start_time = Some(now);
    }

    pub(crate) fn mark_restricting(&mut self) {
        self.restricting = true;
    }
}
