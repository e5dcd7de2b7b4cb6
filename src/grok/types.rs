//! Tipos de dados para requisições e respostas do endpoint de chat completions.
//!
//! O formato segue o contrato compatível com OpenAI exposto pela xAI:
//! uma mensagem de sistema opcional seguida de uma mensagem de usuário, cujo
//! conteúdo é texto simples ou uma lista de partes (texto e imagem).

use serde::{Deserialize, Serialize};

/// Corpo da requisição para `/v1/chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Identificador do modelo (ex.: "grok-4").
    pub model: String,
    /// Mensagens da conversa, sistema antes do usuário.
    pub messages: Vec<ChatMessage>,
}

/// Papel do remetente de uma mensagem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// Uma única mensagem da conversa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Mensagem de usuário; com imagem, o conteúdo vira uma lista de partes.
    pub fn user(text: impl Into<String>, image_data_url: Option<String>) -> Self {
        let content = match image_data_url {
            None => MessageContent::Text(text.into()),
            Some(url) => MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url,
                        detail: IMAGE_DETAIL.to_string(),
                    },
                },
            ]),
        };
        Self {
            role: Role::User,
            content,
        }
    }
}

/// Nível de detalhe pedido ao modelo para cada imagem enviada.
pub const IMAGE_DETAIL: &str = "medium";

/// Conteúdo de mensagem: texto simples ou partes multimodais.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// Parte de uma mensagem multimodal. Serializada com o campo `"type"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// URL da imagem (normalmente um data URL base64) e o nível de detalhe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    pub detail: String,
}

/// Resposta do endpoint. Apenas `choices[0].message.content` é consumido.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

/// Mensagem gerada pelo modelo. `content` pode vir nulo em respostas de ferramenta.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Texto da primeira escolha, se houver.
    pub fn into_content(self) -> Option<String> {
        self.choices.into_iter().next()?.message.content
    }
}
