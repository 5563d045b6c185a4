//! Remote completion client for OpenAI-compatible APIs
//!
//! Targets OpenRouter by default. The API key is resolved once at startup;
//! without it every call fails before touching the network.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::completion::CompletionProvider;
use crate::completion::types::{
    ChatCompletionRequest, ChatCompletionResponse, Message, extract_error_message,
};
use crate::config::CompletionConfig;
use crate::error::{DocentError, Result};
use crate::prompt::PromptSet;

/// Completion client using OpenAI-compatible HTTP APIs
#[derive(Debug)]
pub struct CompletionClient {
    client: Client,
    config: CompletionConfig,
    endpoint: String,
}

impl CompletionClient {
    /// Create a client. A missing API key is not an error here; it is
    /// reported per request by [`CompletionProvider::ensure_configured`].
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocentError::Config(format!("Failed to create HTTP client: {e}")))?;

        let endpoint = format!("{}/chat/completions", config.api_url.trim_end_matches('/'));
        info!(
            "CompletionClient initialized with model: {}, endpoint: {}",
            config.model, endpoint
        );

        Ok(Self {
            client,
            config: config.clone(),
            endpoint,
        })
    }

    fn api_key(&self) -> Result<&str> {
        self.config.api_key.as_deref().ok_or_else(|| {
            DocentError::Config(format!(
                "{} is not configured",
                self.config.api_key_env
            ))
        })
    }

    fn build_request(&self, prompt: &PromptSet) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message::system(prompt.system.as_str()),
                Message::user(prompt.user.as_str()),
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            top_p: self.config.top_p,
        }
    }
}

#[async_trait]
impl CompletionProvider for CompletionClient {
    fn ensure_configured(&self) -> Result<()> {
        self.api_key().map(|_| ())
    }

    async fn complete(&self, prompt: &PromptSet) -> Result<String> {
        let api_key = self.api_key()?;
        let request = self.build_request(prompt);

        debug!(
            "Calling completion API at {} ({} system chars)",
            self.endpoint, prompt.embedded_chars
        );

        let mut builder = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request);
        if let Some(ref site_url) = self.config.site_url {
            builder = builder.header("HTTP-Referer", site_url);
        }
        if let Some(ref app_name) = self.config.app_name {
            builder = builder.header("X-Title", app_name);
        }

        let response = builder.send().await.map_err(|e| {
            error!("Completion request got no response: {e}");
            if e.is_timeout() {
                DocentError::transport("Completion request timed out")
            } else {
                DocentError::transport("No response from completion provider")
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Completion provider error")
                    .to_string()
            });
            error!("Completion provider returned {status}: {message}");
            return Err(DocentError::upstream(status.as_u16(), message));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Unreadable completion response: {e}");
            DocentError::upstream(502, "Invalid response from completion provider")
        })?;

        completion
            .first_content()
            .ok_or_else(|| DocentError::upstream(502, "No response content received"))
    }

    fn name(&self) -> &'static str {
        "openai-compatible"
    }
}
