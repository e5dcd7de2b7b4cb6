//! Interface de terminal do VerifAI: spinner e saída colorida.
//!
//! Usa as crates `indicatif` para o spinner enquanto a requisição está em
//! andamento e `console` para estilização com cores.

use chrono::{DateTime, Utc};
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::restriction::ShieldState;
use crate::task::{EvaluationOutcome, Task};

/// Spinner exibido durante a única chamada ao modelo.
pub struct Progress {
    pb: ProgressBar,
}

impl Progress {
    /// Inicia o spinner com a mensagem dada.
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        // O template é constante; se falhar, fica o estilo padrão.
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

/// Exibe o resultado de uma submissão: verde para aprovado, vermelho para reprovado.
pub fn print_outcome(outcome: &EvaluationOutcome, task: &Task) {
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();

    match outcome {
        EvaluationOutcome::Passed {
            is_final: true,
            description,
            clear_error,
        } => {
            println!("  {} Completed!", green.apply_to("✓"));
            println!("    {description}");
            if clear_error.is_none() {
                println!("  You may now use your restricted apps.");
            }
        }
        EvaluationOutcome::Passed {
            is_final: false,
            description,
            ..
        } => {
            println!(
                "  {} Checkpoint {}/{} passed",
                green.apply_to("✓"),
                task.checkpoints_passed(),
                task.checkpoint_total()
            );
            println!("    {description}");
        }
        EvaluationOutcome::Failed { description } => {
            println!("  {} You did not complete the task, try again.", red.apply_to("✗"));
            println!("    {description}");
        }
        EvaluationOutcome::Error(e) => {
            print_error(&e.to_string());
        }
    }
}

/// Imprime o estado da tarefa ativa e das restrições.
pub fn print_status(task: &Task, shield: &ShieldState, now: DateTime<Utc>) {
    let dim = Style::new().dim();
    let yellow = Style::new().yellow();

    println!("{}", Style::new().bold().apply_to(&task.prompt));
    println!("  phase:       {}", task.phase());
    println!("  difficulty:  {}", task.difficulty);
    println!(
        "  progress:    {}/{}",
        task.checkpoints_passed(),
        task.checkpoint_total()
    );
    println!(
        "  rubric:      {}",
        task.rubric.as_deref().unwrap_or("(none yet)")
    );
    for (i, it) in task.iterations.iter().enumerate() {
        let state = it.state.as_deref().unwrap_or("-");
        let label = if task.has_baseline && i == 0 {
            "[before]".to_string()
        } else {
            format!("[{}]", task.checkpoint_number(i))
        };
        println!("  {} {state}", dim.apply_to(label));
    }
    match task.minutes_until_restricting(now) {
        Some(mins) => println!("  window:      {mins} min left"),
        None => println!("  window:      -"),
    }
    let restricting = if task.restricting {
        yellow.apply_to("yes")
    } else {
        dim.apply_to("no")
    };
    println!("  restricting: {restricting}");
    println!(
        "  shielded:    {}",
        if shield.shielded.is_empty() {
            "nothing".to_string()
        } else {
            shield.shielded.join(", ")
        }
    );
}

pub fn print_info(message: &str) {
    println!("  {} {message}", Style::new().cyan().apply_to("•"));
}

pub fn print_error(message: &str) {
    eprintln!("  {} {message}", Style::new().red().bold().apply_to("✗"));
}
