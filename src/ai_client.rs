// src/ai_client.rs
use crate::config::AiConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Error, Debug)]
pub enum AiError {
    #[error("Anthropic API key not configured")]
    NotConfigured,
    #[error("Failed to send request to the model API: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Model API returned error: {status} - {body}")]
    Status { status: u16, body: String },
    #[error("No text content in response")]
    EmptyResponse,
}

/// Anything that turns a prompt into text.
pub trait TextGenerator {
    fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, AiError>;
}

#[derive(Serialize, Debug)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize, Debug)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize, Debug)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct AnthropicClient {
    http_client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    api_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http_client: reqwest::blocking::Client::new(),
            api_key,
            model,
            api_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        let api_key = config.api_key().ok_or(AiError::NotConfigured)?;
        Ok(Self::new(api_key, config.model.clone()))
    }
}

impl TextGenerator for AnthropicClient {
    fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, AiError> {
        info!(
            "Sending POST to {} (model {}, max_tokens {}, prompt {} chars)",
            self.api_url,
            self.model,
            max_tokens,
            prompt.len()
        );
        let request = MessageRequest {
            model: &self.model,
            max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http_client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .unwrap_or_else(|_| "Could not read error body".to_string());
            error!("Model request failed with status: {}. Body: {}", status, body);
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let message: MessageResponse = response.json()?;
        let text = message
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or(AiError::EmptyResponse)?;
        debug!("Received {} chars of model output", text.len());
        Ok(text)
    }
}
