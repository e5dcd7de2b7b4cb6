use std::time::Duration;

use reqwest::{Client, Url};

use super::error::GrokError;
use super::photo::{downscale_jpeg, jpeg_data_url};
use super::types::{ChatMessage, ChatRequest, ChatResponse};
use crate::config::VerifaiConfig;

/// One evaluation call: user prompt, optional evidence photo, optional system
/// instruction.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationRequest<'a> {
    pub prompt: &'a str,
    pub image: Option<&'a [u8]>,
    pub system: Option<&'a str>,
}

/// Sends a single prompt to a vision model and returns its raw text reply.
///
/// Implementations must not retry: one call, one result.
pub trait Evaluator {
    async fn evaluate(&self, request: EvaluationRequest<'_>) -> Result<String, GrokError>;
}

/// Chat-completion client for the xAI endpoint (or any compatible one).
pub struct GrokClient {
    api_key: String,
    endpoint: String,
    model: String,
    max_image_edge: u32,
    jpeg_quality: u8,
    client: Client,
}

impl GrokClient {
    pub fn from_config(config: &VerifaiConfig) -> Result<Self, GrokError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_image_edge: config.max_image_edge,
            jpeg_quality: config.jpeg_quality,
            client,
        })
    }

    fn endpoint_url(&self) -> Result<Url, GrokError> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| GrokError::InvalidEndpoint(format!("{}: {e}", self.endpoint)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(GrokError::InvalidEndpoint(format!(
                "{}: unsupported scheme {other}",
                self.endpoint
            ))),
        }
    }

    fn build_request(&self, request: &EvaluationRequest<'_>) -> Result<ChatRequest, GrokError> {
        let image_url = match request.image {
            Some(bytes) => {
                let jpeg = downscale_jpeg(bytes, self.max_image_edge, self.jpeg_quality)?;
                Some(jpeg_data_url(&jpeg))
            }
            None => None,
        };

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(request.prompt, image_url));

        Ok(ChatRequest {
            model: self.model.clone(),
            messages,
        })
    }
}

impl Evaluator for GrokClient {
    async fn evaluate(&self, request: EvaluationRequest<'_>) -> Result<String, GrokError> {
        if self.api_key.trim().is_empty() {
            return Err(GrokError::MissingApiKey);
        }
        let url = self.endpoint_url()?;
        let body = self.build_request(&request)?;

        tracing::debug!(
            model = %self.model,
            has_image = request.image.is_some(),
            "sending evaluation request"
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = String::from_utf8_lossy(&bytes).into_owned();
            return Err(GrokError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        if bytes.is_empty() {
            return Err(GrokError::NoData);
        }

        let parsed: ChatResponse = serde_json::from_slice(&bytes)
            .map_err(|e| GrokError::UnparseableResponse(e.to_string()))?;
        parsed.into_content().ok_or_else(|| {
            GrokError::UnparseableResponse("missing choices[0].message.content".into())
        })
    }
}
