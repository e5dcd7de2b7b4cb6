//! Tipos de erro para o cliente de avaliação.
//!
//! Define [`GrokError`] com uma variante por falha possível de uma única
//! chamada ao modelo. Nenhuma variante dispara retentativa: o erro sobe
//! direto para quem chamou.

use thiserror::Error;

/// Erros que podem ocorrer ao pedir uma avaliação ao modelo.
#[derive(Debug, Error)]
pub enum GrokError {
    /// Nenhuma chave configurada. Nenhuma requisição é feita.
    #[error("API key not configured (set api_key in verifai.toml or GROK_API_KEY)")]
    MissingApiKey,

    /// A URL do endpoint configurada não é válida.
    #[error("invalid API endpoint URL: {0}")]
    InvalidEndpoint(String),

    /// O servidor respondeu com corpo vazio.
    #[error("no data received from the model API")]
    NoData,

    /// O corpo não contém `choices[0].message.content` como string.
    #[error("failed to parse model API response: {0}")]
    UnparseableResponse(String),

    /// Status HTTP fora da faixa 2xx, com a mensagem do corpo.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// A imagem enviada não pôde ser decodificada ou recodificada.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<image::ImageError> for GrokError {
    fn from(err: image::ImageError) -> Self {
        GrokError::InvalidImage(err.to_string())
    }
}
