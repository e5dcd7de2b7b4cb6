mod cli;
mod config;
mod engine;
mod error;
mod grok;
mod parser;
mod prompts;
mod restriction;
mod store;
mod task;
mod ui;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::{Cli, Command, DifficultyArg};
use config::VerifaiConfig;
use engine::IterationEngine;
use error::VerifaiError;
use grok::GrokClient;
use restriction::{AppSelection, FileGateway, RestrictionGateway};
use store::TaskStore;
use task::{EvaluationOutcome, Task};

type Engine = IterationEngine<GrokClient, FileGateway>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::print_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("verifai=debug")
        } else {
            EnvFilter::new("verifai=warn")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = VerifaiConfig::load(cli.config.as_deref())?;
    let store = TaskStore::new(&config.data_dir);
    let engine = IterationEngine::new(
        GrokClient::from_config(&config)?,
        FileGateway::new(&config.data_dir),
        AppSelection::new(config.blocked_apps.clone()),
    );

    match cli.command {
        Command::New {
            prompt,
            iterations,
            difficulty,
            minutes,
            before,
        } => {
            let minutes = minutes.unwrap_or(config.default_minutes);
            cmd_new(&engine, &store, prompt, usize::from(iterations), difficulty, minutes, before).await
        }
        Command::Submit { image } => cmd_submit(&engine, &store, image).await,
        Command::Rubric { before } => cmd_rubric(&engine, &store, before).await,
        Command::Status => cmd_status(&engine, &store),
        Command::Check => cmd_check(&engine, &store),
        Command::Abandon => cmd_abandon(&engine, &store),
    }
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading image {}", path.display()))
}

const UNREADABLE_HINT: &str = "stored task could not be read; run `verifai abandon` to discard it";

fn active_task(store: &TaskStore) -> Result<Task> {
    Ok(store
        .load_active()
        .context(UNREADABLE_HINT)?
        .ok_or(VerifaiError::NoTask)?)
}

async fn cmd_new(
    engine: &Engine,
    store: &TaskStore,
    prompt: String,
    iterations: usize,
    difficulty: DifficultyArg,
    minutes: u32,
    before: Option<PathBuf>,
) -> Result<()> {
    if store.load_active().context(UNREADABLE_HINT)?.is_some() {
        return Err(VerifaiError::TaskExists.into());
    }
    let before = before.as_deref().map(read_image).transpose()?;

    let mut task = Task::new(prompt, difficulty.into(), iterations, Some(minutes));

    let progress = ui::Progress::start("Generating rubric...");
    let rubric = engine.establish_rubric(&mut task, before.as_deref()).await;
    progress.finish();

    engine.gateway().apply_restrictions(engine.selection())?;
    engine.gateway().start_monitoring()?;
    task.restricting = true;
    store.save(&task)?;

    match rubric {
        Ok(()) => {
            ui::print_info(&format!(
                "Task created with {} checkpoint(s). Apps are now restricted.",
                task.checkpoint_total()
            ));
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e).context(
            "task saved without a rubric; run `verifai rubric` (with the same --before, if any) to retry",
        )),
    }
}

async fn cmd_submit(engine: &Engine, store: &TaskStore, image: PathBuf) -> Result<()> {
    let mut task = active_task(store)?;
    let image = read_image(&image)?;

    let progress = ui::Progress::start("Checking progress...");
    let outcome = engine.submit_iteration(&mut task, &image).await;
    progress.finish();

    let outcome = match outcome {
        EvaluationOutcome::Error(e) => return Err(e.into()),
        outcome => outcome,
    };
    store.save(&task)?;
    ui::print_outcome(&outcome, &task);

    match outcome {
        EvaluationOutcome::Passed {
            clear_error: Some(e),
            ..
        } => Err(anyhow::Error::new(e)
            .context("task completed but restrictions could not be lifted; run `verifai abandon` to retry")),
        _ => Ok(()),
    }
}

async fn cmd_rubric(engine: &Engine, store: &TaskStore, before: Option<PathBuf>) -> Result<()> {
    let mut task = active_task(store)?;
    if let Some(rubric) = &task.rubric {
        ui::print_info(&format!("Rubric already established: {rubric}"));
        return Ok(());
    }
    let before = before.as_deref().map(read_image).transpose()?;

    let progress = ui::Progress::start("Generating rubric...");
    let result = engine.establish_rubric(&mut task, before.as_deref()).await;
    progress.finish();
    result?;

    store.save(&task)?;
    ui::print_info("Rubric established.");
    Ok(())
}

fn cmd_status(engine: &Engine, store: &TaskStore) -> Result<()> {
    let shield = engine.gateway().state()?;
    match store.load_active()? {
        Some(task) => ui::print_status(&task, &shield, Utc::now()),
        None => ui::print_info("No active task."),
    }
    Ok(())
}

fn cmd_check(engine: &Engine, store: &TaskStore) -> Result<()> {
    let mut task = active_task(store)?;
    if engine.enforce_window(&mut task, Utc::now())? {
        store.save(&task)?;
        ui::print_info("Active window elapsed. Apps are restricted again.");
    } else {
        match task.minutes_until_restricting(Utc::now()) {
            Some(mins) if !task.restricting => {
                ui::print_info(&format!("{mins} minute(s) left in the active window."))
            }
            _ => ui::print_info("Nothing to do."),
        }
    }
    Ok(())
}

/// Lift every restriction and drop the stored task, whether or not it can
/// still be read.
fn cmd_abandon(engine: &Engine, store: &TaskStore) -> Result<()> {
    let task = store.load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "discarding unreadable task record");
        None
    });
    engine.gateway().stop_monitoring()?;
    store.clear()?;

    match task {
        Some(task) => ui::print_info(&format!("Abandoned task: {}", task.prompt)),
        None => ui::print_info("No active task. Restrictions lifted."),
    }
    Ok(())
}
