//! Prompt templates sent to the vision model.
//!
//! Every template asks for tagged fields so the reply can be read back with
//! [`extract_tag`](crate::parser::extract_tag).

use crate::task::{Difficulty, Task};

pub const RUBRIC_TAG: &str = "rubric";
pub const INITIAL_STATE_TAG: &str = "initial_state";
pub const STATE_TAG: &str = "current_state";
pub const VERDICT_TAG: &str = "verdict";

fn strictness(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Lenient => {
            "Be lenient: give the user the benefit of the doubt whenever the photo \
             plausibly shows an honest effort toward the goal."
        }
        Difficulty::Regular => {
            "Be fair: pass the user when the photo clearly shows real progress \
             toward the goal."
        }
        Difficulty::Extreme => {
            "Be extremely strict: pass the user only when the photo leaves no doubt \
             that the expected progress was made. Any ambiguity is a failure."
        }
    }
}

pub fn rubric_system(difficulty: Difficulty) -> String {
    format!(
        "You design grading rubrics for a focus app. Users declare a task and later \
         prove their progress with photos, one photo per checkpoint. {}",
        strictness(difficulty)
    )
}

pub fn rubric_user(task: &Task, with_before_image: bool) -> String {
    let checkpoints = task.checkpoint_total();
    let mut prompt = format!(
        "Task: {}\n\
         Checkpoints: {checkpoints}\n\n\
         Write a short rubric describing what a photo must show at each checkpoint \
         for the task to count as progressing and, at the last checkpoint, as done. \
         Wrap the rubric in <{RUBRIC_TAG}></{RUBRIC_TAG}>.",
        task.prompt
    );
    if with_before_image {
        prompt.push_str(&format!(
            "\n\nThe attached photo shows the situation before the user started. \
             Describe what it shows that is relevant to the task, wrapped in \
             <{INITIAL_STATE_TAG}></{INITIAL_STATE_TAG}>."
        ));
    }
    prompt
}

/// System instruction for judging the evidence at iteration `index`.
///
/// Without a previous state the model judges the photo against the rubric
/// alone; with one, it judges progress (or regression) relative to it.
pub fn iteration_system(task: &Task, index: usize, previous_state: Option<&str>) -> String {
    let rubric = task.rubric.as_deref().unwrap_or_default();
    let total = task.checkpoint_total();
    let checkpoint = task.checkpoint_number(index);
    let is_last = checkpoint == total;

    let mut system = format!(
        "You verify photographic evidence that a user is completing a task.\n\
         Task: {}\n\
         Rubric: {rubric}\n\
         This is checkpoint {checkpoint} of {total}{}.\n\
         {}\n",
        task.prompt,
        if is_last { " (the final one)" } else { "" },
        strictness(task.difficulty)
    );

    match previous_state {
        None => system.push_str(
            "There is no earlier checkpoint. Judge the photo against the rubric alone.\n",
        ),
        Some(prev) => system.push_str(&format!(
            "At the previous checkpoint the situation was described as:\n{prev}\n\
             Compare the photo with that description. Progress beyond it passes; \
             no change or a regression fails.\n"
        )),
    }
    system
}

pub fn iteration_user() -> String {
    format!(
        "Here is my evidence photo. Describe the current state of the task as shown \
         in the photo, wrapped in <{STATE_TAG}></{STATE_TAG}>. Then answer whether \
         this checkpoint is passed with exactly yes or no, wrapped in \
         <{VERDICT_TAG}></{VERDICT_TAG}>."
    )
}
