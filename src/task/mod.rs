mod model;
mod state;

pub use model::{Difficulty, Iteration, Task};
pub use state::{EvaluationOutcome, TaskPhase};
