use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ProviderError, SuggestionProvider};
use crate::config::ProviderConfig;
use crate::settings::ProviderSettings;

const SYSTEM_PROMPT: &str = "You are a command-line productivity coach. \
Given one shell command a developer ran, reply with short, practical suggestions: \
a faster or safer equivalent, useful flags, aliases, or a modern replacement tool. \
Answer in at most five bullet points and do not repeat the command back.";

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_tokens: config.max_tokens,
        })
    }

    fn build_request<'a>(&self, command: &'a str, model: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: command,
                },
            ],
            max_tokens: self.max_tokens,
        }
    }
}

/// Map a non-success status to the matching provider error.
fn classify_status(status: StatusCode, body: String) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::Unauthorized(status.as_u16())
        }
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
        _ => ProviderError::Status {
            status: status.as_u16(),
            body: truncate(&body, 512),
        },
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

fn extract_content(response: ChatResponse) -> Result<String, ProviderError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .map(|c| c.trim().to_string())
        .unwrap_or_default();

    if content.is_empty() {
        return Err(ProviderError::Malformed(
            "response contained no message content".to_string(),
        ));
    }
    Ok(content)
}

#[async_trait]
impl SuggestionProvider for OpenAiProvider {
    async fn generate(
        &self,
        command: &str,
        settings: &ProviderSettings,
    ) -> Result<String, ProviderError> {
        if !settings.has_api_key() {
            return Err(ProviderError::MissingCredential);
        }

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&settings.api_key)
            .json(&self.build_request(command, &settings.model))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        extract_content(parsed)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
