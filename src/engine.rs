use chrono::{DateTime, Utc};

use crate::error::{Result, VerifaiError};
use crate::grok::{EvaluationRequest, Evaluator};
use crate::parser::extract_tag;
use crate::prompts::{self, INITIAL_STATE_TAG, RUBRIC_TAG, STATE_TAG, VERDICT_TAG};
use crate::restriction::{AppSelection, RestrictionGateway};
use crate::task::{EvaluationOutcome, Task};

/// Judgement parsed from one iteration reply.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Judgement {
    description: String,
    passed: bool,
}

fn required_tag<'a>(reply: &'a str, tag: &str) -> Result<&'a str> {
    extract_tag(reply, tag).ok_or_else(|| VerifaiError::MissingTag(tag.to_string()))
}

fn parse_judgement(reply: &str) -> Result<Judgement> {
    let description = required_tag(reply, STATE_TAG)?.to_string();
    let verdict = required_tag(reply, VERDICT_TAG)?;
    let passed = if verdict.eq_ignore_ascii_case("yes") {
        true
    } else if verdict.eq_ignore_ascii_case("no") {
        false
    } else {
        return Err(VerifaiError::InvalidVerdict(verdict.to_string()));
    };
    Ok(Judgement {
        description,
        passed,
    })
}

/// Drives a [`Task`] through evidence submissions.
///
/// Each call makes at most one model request and applies exactly one
/// outcome. Callers serialise submissions per task; `&mut Task` enforces it
/// within a process.
pub struct IterationEngine<E, G> {
    evaluator: E,
    gateway: G,
    selection: AppSelection,
}

impl<E: Evaluator, G: RestrictionGateway> IterationEngine<E, G> {
    pub fn new(evaluator: E, gateway: G, selection: AppSelection) -> Self {
        Self {
            evaluator,
            gateway,
            selection,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn selection(&self) -> &AppSelection {
        &self.selection
    }

    /// Ask the model for the task's rubric.
    ///
    /// With a "before" photo the model also describes the starting situation,
    /// which becomes a resolved leading iteration so the first real
    /// submission is judged as progress from it. The task is only mutated
    /// when every requested field was parsed.
    pub async fn establish_rubric(&self, task: &mut Task, before_image: Option<&[u8]>) -> Result<()> {
        let system = prompts::rubric_system(task.difficulty);
        let prompt = prompts::rubric_user(task, before_image.is_some());

        let reply = self
            .evaluator
            .evaluate(EvaluationRequest {
                prompt: &prompt,
                image: before_image,
                system: Some(&system),
            })
            .await?;

        let rubric = required_tag(&reply, RUBRIC_TAG)?.to_string();
        let baseline = match before_image {
            Some(_) => Some(required_tag(&reply, INITIAL_STATE_TAG)?.to_string()),
            None => None,
        };

        task.rubric = Some(rubric);
        if let Some(baseline) = baseline {
            if task.resolved_count() == 0 {
                task.record_baseline(baseline);
            } else {
                tracing::debug!(task = %task.id, "task already has progress; ignoring baseline");
            }
        }
        tracing::info!(task = %task.id, "rubric established");
        Ok(())
    }

    /// Judge one evidence photo against the task's next open iteration.
    pub async fn submit_iteration(&self, task: &mut Task, image: &[u8]) -> EvaluationOutcome {
        match self.try_submit(task, image).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(task = %task.id, error = %e, "iteration submission failed");
                EvaluationOutcome::Error(e)
            }
        }
    }

    async fn try_submit(&self, task: &mut Task, image: &[u8]) -> Result<EvaluationOutcome> {
        if task.rubric.is_none() {
            return Err(VerifaiError::RubricMissing);
        }
        let index = task.pointer().ok_or(VerifaiError::NoPendingIteration)?;

        let system = prompts::iteration_system(task, index, task.previous_state(index));
        let prompt = prompts::iteration_user();
        tracing::debug!(task = %task.id, index, "judging iteration");

        let reply = self
            .evaluator
            .evaluate(EvaluationRequest {
                prompt: &prompt,
                image: Some(image),
                system: Some(&system),
            })
            .await?;
        let judgement = parse_judgement(&reply)?;

        if !judgement.passed {
            task.mark_restricting();
            tracing::info!(task = %task.id, index, "iteration failed");
            return Ok(EvaluationOutcome::Failed {
                description: judgement.description,
            });
        }

        let is_final = index + 1 == task.iterations.len();
        task.record_pass(index, judgement.description.clone());

        let clear_error = if is_final {
            tracing::info!(task = %task.id, "final iteration passed; task completed");
            match self.gateway.clear_restrictions() {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!(task = %task.id, error = %e, "failed to clear restrictions");
                    Some(e)
                }
            }
        } else {
            task.restart_window(Utc::now());
            tracing::info!(task = %task.id, index, "iteration passed");
            None
        };

        Ok(EvaluationOutcome::Passed {
            is_final,
            description: judgement.description,
            clear_error,
        })
    }

    /// Re-apply restrictions once the active window has run out.
    ///
    /// Returns whether restrictions were applied by this call.
    pub fn enforce_window(&self, task: &mut Task, now: DateTime<Utc>) -> Result<bool> {
        if task.is_complete() || task.restricting || !task.window_elapsed(now) {
            return Ok(false);
        }
        self.gateway.apply_restrictions(&self.selection)?;
        self.gateway.start_monitoring()?;
        task.mark_restricting();
        tracing::info!(task = %task.id, "active window elapsed; restrictions applied");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grok::GrokError;
    use crate::task::{Difficulty, TaskPhase};
    use chrono::Duration;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records every request it receives.
    struct MockEvaluator {
        replies: Mutex<VecDeque<Result<String, GrokError>>>,
        seen: Mutex<Vec<(String, Option<String>, bool)>>,
    }

    impl MockEvaluator {
        fn new(replies: Vec<Result<String, GrokError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn replying<S: AsRef<str>>(texts: &[S]) -> Self {
            Self::new(texts.iter().map(|t| Ok(t.as_ref().to_string())).collect())
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        fn last_system(&self) -> String {
            self.seen.lock().unwrap().last().unwrap().1.clone().unwrap()
        }
    }

    impl Evaluator for MockEvaluator {
        async fn evaluate(&self, request: EvaluationRequest<'_>) -> Result<String, GrokError> {
            self.seen.lock().unwrap().push((
                request.prompt.to_string(),
                request.system.map(str::to_string),
                request.image.is_some(),
            ));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GrokError::NoData))
        }
    }

    #[derive(Default)]
    struct MockGateway {
        applied: Mutex<Vec<AppSelection>>,
        cleared: Mutex<usize>,
        monitoring: Mutex<bool>,
        fail_clear: bool,
    }

    impl MockGateway {
        fn cleared(&self) -> usize {
            *self.cleared.lock().unwrap()
        }
    }

    impl RestrictionGateway for MockGateway {
        fn apply_restrictions(&self, selection: &AppSelection) -> Result<()> {
            self.applied.lock().unwrap().push(selection.clone());
            Ok(())
        }

        fn clear_restrictions(&self) -> Result<()> {
            *self.cleared.lock().unwrap() += 1;
            if self.fail_clear {
                return Err(VerifaiError::Restriction("shield store unavailable".into()));
            }
            Ok(())
        }

        fn start_monitoring(&self) -> Result<()> {
            *self.monitoring.lock().unwrap() = true;
            Ok(())
        }

        fn stop_monitoring(&self) -> Result<()> {
            *self.monitoring.lock().unwrap() = false;
            Ok(())
        }
    }

    fn engine(evaluator: MockEvaluator) -> IterationEngine<MockEvaluator, MockGateway> {
        IterationEngine::new(
            evaluator,
            MockGateway::default(),
            AppSelection::new(vec!["com.example.social".into()]),
        )
    }

    fn ready_task(iterations: usize) -> Task {
        let mut task = Task::new("Clean the kitchen".into(), Difficulty::Regular, iterations, Some(30));
        task.rubric = Some("Counters clear, dishes put away".into());
        task
    }

    fn reply(state: &str, verdict: &str) -> String {
        format!("<current_state>{state}</current_state>\n<verdict>{verdict}</verdict>")
    }

    const PHOTO: &[u8] = b"jpeg bytes";

    #[test]
    fn judgement_accepts_yes_and_no_in_any_case() {
        assert!(parse_judgement(&reply("s", "yes")).unwrap().passed);
        assert!(parse_judgement(&reply("s", "YES")).unwrap().passed);
        assert!(!parse_judgement(&reply("s", " No ")).unwrap().passed);
    }

    #[test]
    fn judgement_rejects_other_verdicts() {
        let err = parse_judgement(&reply("s", "maybe")).unwrap_err();
        assert!(matches!(err, VerifaiError::InvalidVerdict(v) if v == "maybe"));
    }

    #[test]
    fn judgement_requires_both_tags() {
        let err = parse_judgement("<verdict>yes</verdict>").unwrap_err();
        assert!(matches!(err, VerifaiError::MissingTag(t) if t == STATE_TAG));
        let err = parse_judgement("<current_state>s</current_state>").unwrap_err();
        assert!(matches!(err, VerifaiError::MissingTag(t) if t == VERDICT_TAG));
    }

    #[tokio::test]
    async fn rubric_without_before_image() {
        let engine = engine(MockEvaluator::replying(&["<rubric>Sink empty</rubric>"]));
        let mut task = Task::new("Do the dishes".into(), Difficulty::Lenient, 2, None);
        assert_eq!(task.phase(), TaskPhase::Created);

        engine.establish_rubric(&mut task, None).await.unwrap();
        assert_eq!(task.rubric.as_deref(), Some("Sink empty"));
        assert_eq!(task.iterations.len(), 2);
        assert_eq!(task.phase(), TaskPhase::AwaitingIteration);
    }

    #[tokio::test]
    async fn rubric_with_before_image_records_baseline() {
        let evaluator = MockEvaluator::replying(&[
            "<rubric>Sink empty</rubric><initial_state>Sink full of plates</initial_state>",
        ]);
        let engine = engine(evaluator);
        let mut task = Task::new("Do the dishes".into(), Difficulty::Regular, 2, None);

        engine.establish_rubric(&mut task, Some(PHOTO)).await.unwrap();
        assert_eq!(task.iterations.len(), 3);
        assert_eq!(task.iterations[0].state.as_deref(), Some("Sink full of plates"));
        assert_eq!(task.pointer(), Some(1));
    }

    #[tokio::test]
    async fn rubric_missing_initial_state_leaves_task_untouched() {
        let engine = engine(MockEvaluator::replying(&["<rubric>Sink empty</rubric>"]));
        let mut task = Task::new("Do the dishes".into(), Difficulty::Regular, 2, None);
        let before = task.clone();

        let err = engine.establish_rubric(&mut task, Some(PHOTO)).await.unwrap_err();
        assert!(matches!(err, VerifaiError::MissingTag(t) if t == INITIAL_STATE_TAG));
        assert_eq!(task, before);
    }

    #[tokio::test]
    async fn rubric_model_failure_propagates() {
        let engine = engine(MockEvaluator::new(vec![Err(GrokError::MissingApiKey)]));
        let mut task = Task::new("Do the dishes".into(), Difficulty::Regular, 1, None);
        let err = engine.establish_rubric(&mut task, None).await.unwrap_err();
        assert!(matches!(err, VerifaiError::Grok(GrokError::MissingApiKey)));
        assert!(task.rubric.is_none());
    }

    #[tokio::test]
    async fn rubric_retry_with_before_image_records_baseline() {
        let engine = engine(MockEvaluator::new(vec![
            Err(GrokError::NoData),
            Ok("<rubric>Floor visible</rubric><initial_state>Boxes everywhere</initial_state>".into()),
        ]));
        let mut task = Task::new("Tidy the garage".into(), Difficulty::Regular, 2, None);

        assert!(engine.establish_rubric(&mut task, Some(PHOTO)).await.is_err());
        assert_eq!(task.iterations.len(), 2);

        engine.establish_rubric(&mut task, Some(PHOTO)).await.unwrap();
        assert_eq!(task.rubric.as_deref(), Some("Floor visible"));
        assert!(task.has_baseline);
        assert_eq!(task.iterations[0].state.as_deref(), Some("Boxes everywhere"));
        assert_eq!(task.checkpoint_total(), 2);
        assert_eq!(task.pointer(), Some(1));
    }

    #[tokio::test]
    async fn first_pass_restarts_window_without_lifting_restrictions() {
        let engine = engine(MockEvaluator::replying(&[&reply("Counters half clear", "yes")]));
        let mut task = ready_task(3);
        task.restricting = true;
        let old_start = Utc::now() - Duration::hours(1);
        task.start_time = Some(old_start);

        let outcome = engine.submit_iteration(&mut task, PHOTO).await;
        match outcome {
            EvaluationOutcome::Passed {
                is_final,
                description,
                clear_error,
            } => {
                assert!(!is_final);
                assert!(clear_error.is_none());
                assert_eq!(description, "Counters half clear");
            }
            other => panic!("expected Passed, got {other:?}"),
        }
        assert_eq!(task.iterations[0].state.as_deref(), Some("Counters half clear"));
        assert!(!task.restricting);
        assert!(task.start_time.unwrap() > old_start);
        assert_eq!(engine.gateway().cleared(), 0);
    }

    #[tokio::test]
    async fn first_iteration_has_no_previous_context() {
        let evaluator = MockEvaluator::replying(&[&reply("s", "yes")]);
        let engine = engine(evaluator);
        let mut task = ready_task(2);

        engine.submit_iteration(&mut task, PHOTO).await;
        let system = engine.evaluator.last_system();
        assert!(system.contains("no earlier checkpoint"));
    }

    #[tokio::test]
    async fn later_iteration_includes_previous_state() {
        let engine = engine(MockEvaluator::replying(&[&reply("Dishes in rack", "yes")]));
        let mut task = ready_task(3);
        task.iterations[0].state = Some("Plates piled up".into());

        engine.submit_iteration(&mut task, PHOTO).await;
        let system = engine.evaluator.last_system();
        assert!(system.contains("Plates piled up"));
        assert!(system.contains("regression"));
    }

    #[tokio::test]
    async fn final_pass_completes_task_and_clears_once() {
        let engine = engine(MockEvaluator::replying(&[&reply("Spotless", "yes")]));
        let mut task = ready_task(3);
        task.iterations[0].state = Some("one".into());
        task.iterations[1].state = Some("two".into());
        task.restricting = true;

        let outcome = engine.submit_iteration(&mut task, PHOTO).await;
        assert!(matches!(
            outcome,
            EvaluationOutcome::Passed {
                is_final: true,
                clear_error: None,
                ..
            }
        ));
        assert_eq!(task.iterations[2].state.as_deref(), Some("Spotless"));
        assert!(!task.restricting);
        assert!(task.is_complete());
        assert_eq!(task.phase(), TaskPhase::Completed);
        assert_eq!(engine.gateway().cleared(), 1);
    }

    #[tokio::test]
    async fn final_pass_reports_gateway_failure() {
        let engine = IterationEngine::new(
            MockEvaluator::replying(&[&reply("Spotless", "yes")]),
            MockGateway {
                fail_clear: true,
                ..Default::default()
            },
            AppSelection::default(),
        );
        let mut task = ready_task(1);

        let outcome = engine.submit_iteration(&mut task, PHOTO).await;
        assert!(matches!(
            outcome,
            EvaluationOutcome::Passed {
                is_final: true,
                clear_error: Some(VerifaiError::Restriction(_)),
                ..
            }
        ));
        assert!(task.is_complete());
        assert_eq!(engine.gateway().cleared(), 1);
    }

    #[tokio::test]
    async fn failure_leaves_iteration_open_and_restricts() {
        let engine = engine(MockEvaluator::replying(&[&reply("Nothing changed", "no")]));
        let mut task = ready_task(2);
        let start = task.start_time;

        let outcome = engine.submit_iteration(&mut task, PHOTO).await;
        match outcome {
            EvaluationOutcome::Failed { description } => assert_eq!(description, "Nothing changed"),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(task.iterations[0].state.is_none());
        assert_eq!(task.pointer(), Some(0));
        assert!(task.restricting);
        assert_eq!(task.start_time, start);
        assert_eq!(engine.gateway().cleared(), 0);
    }

    #[tokio::test]
    async fn failed_iteration_can_be_retried() {
        let engine = engine(MockEvaluator::replying(&[
            &reply("Still messy", "no"),
            &reply("Clean now", "yes"),
        ]));
        let mut task = ready_task(1);

        assert!(matches!(
            engine.submit_iteration(&mut task, PHOTO).await,
            EvaluationOutcome::Failed { .. }
        ));
        assert!(matches!(
            engine.submit_iteration(&mut task, PHOTO).await,
            EvaluationOutcome::Passed { is_final: true, .. }
        ));
        assert_eq!(task.iterations[0].state.as_deref(), Some("Clean now"));
    }

    #[tokio::test]
    async fn invalid_verdict_is_error_without_mutation() {
        let engine = engine(MockEvaluator::replying(&[&reply("Looks ok", "probably")]));
        let mut task = ready_task(2);
        let before = task.clone();

        let outcome = engine.submit_iteration(&mut task, PHOTO).await;
        assert!(matches!(
            outcome,
            EvaluationOutcome::Error(VerifaiError::InvalidVerdict(_))
        ));
        assert_eq!(task, before);
    }

    #[tokio::test]
    async fn model_error_is_surfaced_without_mutation() {
        let engine = engine(MockEvaluator::new(vec![Err(GrokError::NoData)]));
        let mut task = ready_task(2);
        let before = task.clone();

        let outcome = engine.submit_iteration(&mut task, PHOTO).await;
        assert!(matches!(
            outcome,
            EvaluationOutcome::Error(VerifaiError::Grok(GrokError::NoData))
        ));
        assert_eq!(task, before);
    }

    #[tokio::test]
    async fn completed_task_rejects_submission_without_calling_model() {
        let engine = engine(MockEvaluator::replying(&[&reply("x", "yes")]));
        let mut task = ready_task(1);
        task.iterations[0].state = Some("done".into());

        let outcome = engine.submit_iteration(&mut task, PHOTO).await;
        assert!(matches!(
            outcome,
            EvaluationOutcome::Error(VerifaiError::NoPendingIteration)
        ));
        assert_eq!(engine.evaluator.calls(), 0);
    }

    #[tokio::test]
    async fn missing_rubric_blocks_submission() {
        let engine = engine(MockEvaluator::replying(&[&reply("x", "yes")]));
        let mut task = Task::new("Stretch".into(), Difficulty::Regular, 1, None);

        let outcome = engine.submit_iteration(&mut task, PHOTO).await;
        assert!(matches!(outcome, EvaluationOutcome::Error(VerifaiError::RubricMissing)));
        assert_eq!(engine.evaluator.calls(), 0);
    }

    #[tokio::test]
    async fn resolved_iterations_stay_a_prefix() {
        let engine = engine(MockEvaluator::replying(&[
            &reply("a", "yes"),
            &reply("b", "no"),
            &reply("c", "maybe"),
            &reply("d", "yes"),
            &reply("e", "yes"),
        ]));
        let mut task = ready_task(3);

        for _ in 0..5 {
            engine.submit_iteration(&mut task, PHOTO).await;
            assert!(task.has_resolved_prefix());
        }
        assert!(task.is_complete());
        assert_eq!(engine.gateway().cleared(), 1);
    }

    #[test]
    fn window_enforcement_applies_restrictions_once() {
        let engine = engine(MockEvaluator::new(Vec::new()));
        let mut task = ready_task(2);
        let start = task.start_time.unwrap();

        assert!(!engine.enforce_window(&mut task, start + Duration::minutes(5)).unwrap());
        assert!(!task.restricting);

        assert!(engine.enforce_window(&mut task, start + Duration::minutes(31)).unwrap());
        assert!(task.restricting);
        assert_eq!(engine.gateway().applied.lock().unwrap().len(), 1);
        assert!(*engine.gateway().monitoring.lock().unwrap());

        assert!(!engine.enforce_window(&mut task, start + Duration::minutes(40)).unwrap());
        assert_eq!(engine.gateway().applied.lock().unwrap().len(), 1);
    }

    #[test]
    fn window_enforcement_ignores_completed_task() {
        let engine = engine(MockEvaluator::new(Vec::new()));
        let mut task = ready_task(1);
        task.iterations[0].state = Some("done".into());
        let later = task.start_time.unwrap() + Duration::days(1);

        assert!(!engine.enforce_window(&mut task, later).unwrap());
        assert!(engine.gateway().applied.lock().unwrap().is_empty());
    }
}
