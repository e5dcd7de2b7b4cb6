//! Configuração do VerifAI carregada a partir de `verifai.toml`.
//!
//! A struct [`VerifaiConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `GROK_API_KEY` tem precedência sobre o arquivo.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Arquivo procurado no diretório atual quando `--config` não é passado.
pub const DEFAULT_CONFIG_FILE: &str = "verifai.toml";

/// Configuração de nível superior carregada de `verifai.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifaiConfig {
    /// Chave (bearer) da API de chat completions.
    #[serde(default)]
    pub api_key: String,

    /// URL completa do endpoint de chat completions.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Identificador do modelo com suporte a visão.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maior lado, em pixels, das imagens enviadas ao modelo.
    #[serde(default = "default_max_image_edge")]
    pub max_image_edge: u32,

    /// Qualidade JPEG usada ao recodificar as imagens.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Tempo máximo de uma requisição, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Janela padrão, em minutos, até as restrições voltarem.
    #[serde(default = "default_minutes")]
    pub default_minutes: u32,

    /// Diretório onde a tarefa ativa e o estado das restrições são gravados.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Aplicativos bloqueados enquanto a tarefa não for comprovada.
    #[serde(default)]
    pub blocked_apps: Vec<String>,
}

// Endpoint padrão: API da xAI.
fn default_endpoint() -> String {
    "https://api.x.ai/v1/chat/completions".to_string()
}

// Modelo padrão: "grok-4".
fn default_model() -> String {
    "grok-4".to_string()
}

// Maior lado padrão: 640px.
fn default_max_image_edge() -> u32 {
    640
}

fn default_jpeg_quality() -> u8 {
    80
}

// Timeout padrão: 60s.
fn default_request_timeout_secs() -> u64 {
    60
}

// Janela padrão: 30 minutos.
fn default_minutes() -> u32 {
    30
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".verifai")
}

impl Default for VerifaiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_endpoint(),
            model: default_model(),
            max_image_edge: default_max_image_edge(),
            jpeg_quality: default_jpeg_quality(),
            request_timeout_secs: default_request_timeout_secs(),
            default_minutes: default_minutes(),
            data_dir: default_data_dir(),
            blocked_apps: Vec::new(),
        }
    }
}

impl VerifaiConfig {
    /// Carrega a configuração do caminho dado, ou de `verifai.toml` no diretório atual.
    /// Usa valores padrão se o arquivo padrão não existir; um caminho explícito
    /// inexistente é erro.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };

        // Variável de ambiente tem precedência sobre o arquivo de configuração para a chave API.
        if let Ok(key) = std::env::var("GROK_API_KEY")
            && !key.is_empty()
        {
            config.api_key = key;
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = toml::from_str::<VerifaiConfig>(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }
}
