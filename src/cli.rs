//! Interface de linha de comando do VerifAI baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (new, submit, rubric,
//! status, check, abandon) e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::task::Difficulty;

/// VerifAI: bloqueia apps até um modelo de visão confirmar que a tarefa foi feita.
#[derive(Debug, Parser)]
#[command(name = "verifai", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./verifai.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Dificuldade aceita pela CLI, mapeada para [`Difficulty`] internamente.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DifficultyArg {
    /// Aceita qualquer esforço plausível.
    Lenient,
    /// Exige progresso claro.
    Regular,
    /// Só aceita evidência inequívoca.
    Extreme,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Lenient => Difficulty::Lenient,
            DifficultyArg::Regular => Difficulty::Regular,
            DifficultyArg::Extreme => Difficulty::Extreme,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Cria uma nova tarefa e bloqueia os apps configurados.
    New {
        /// Descrição da tarefa a cumprir.
        prompt: String,

        /// Quantas fotos de evidência serão exigidas.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=100))]
        iterations: u8,

        /// Rigor do julgamento.
        #[arg(long, value_enum, default_value_t = DifficultyArg::Regular)]
        difficulty: DifficultyArg,

        /// Janela ativa em minutos (padrão: `default_minutes` da configuração).
        #[arg(long)]
        minutes: Option<u32>,

        /// Foto do "antes", usada como estado inicial.
        #[arg(long)]
        before: Option<PathBuf>,
    },

    /// Envia uma foto como evidência da próxima iteração.
    Submit {
        /// Caminho da imagem (JPEG ou PNG).
        image: PathBuf,
    },

    /// Gera novamente a rubrica de uma tarefa que ficou sem ela.
    Rubric {
        /// Foto do "antes", caso a tentativa original tenha usado uma.
        #[arg(long)]
        before: Option<PathBuf>,
    },

    /// Mostra a tarefa ativa e o estado das restrições.
    Status,

    /// Reaplica as restrições se a janela ativa expirou.
    Check,

    /// Descarta a tarefa ativa e remove as restrições.
    Abandon,
}
