//! Optional OpenAI-compatible chat-completion backend.
//!
//! Used only after every rule has declined a message. A failed call is
//! logged and reported as `None` so the responder can fall through.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::LookupError;
use crate::lookups::check_status;

pub const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You are Chatterbox, a friendly and concise chat assistant. \
    Answer in at most three sentences.";
const MAX_TOKENS: u32 = 256;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl LlmConfig {
    /// `None` when the key is absent or blank, which disables the backend.
    pub fn from_key(api_key: Option<String>) -> Option<Self> {
        let api_key = api_key?.trim().to_string();
        if api_key.is_empty() {
            return None;
        }
        Some(Self {
            api_key,
            api_url: DEFAULT_LLM_API_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            timeout: Duration::from_secs(15),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    /// Completion for `message`, or `None` on any failure.
    pub async fn complete(&self, message: &str) -> Option<String> {
        match self.request(message).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                error!(model = %self.config.model, error = %e, "language model call failed");
                None
            }
        }
    }

    async fn request(&self, message: &str) -> Result<String, LookupError> {
        let url = format!("{}/chat/completions", self.config.api_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: message,
                },
            ],
            max_tokens: MAX_TOKENS,
        };

        debug!(model = %self.config.model, "requesting completion");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let parsed: ChatResponse = check_status(resp)?.json().await?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(LookupError::Empty)
    }
}
