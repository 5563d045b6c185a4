//! Per-question orchestration
//!
//! validate -> rate limit -> credential check -> fetch -> prompt ->
//! completion -> format. Any failure short-circuits; nothing partial is
//! returned.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::completion::CompletionProvider;
use crate::error::{DocentError, Result};
use crate::format::ResponseFormatter;
use crate::prompt::PromptBuilder;
use crate::ratelimit::{Admission, RateLimiter};
use crate::source::{ContentFetcher, SourceStats};

/// Longest accepted question, in characters
pub const MAX_INPUT_CHARS: usize = 500;

/// Inbound question
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatQuery {
    #[serde(default)]
    pub user_input: Option<String>,
}

impl ChatQuery {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: Some(user_input.into()),
        }
    }

    /// The trimmed question, or a validation error. The length limit
    /// applies to the input as sent, surrounding whitespace included.
    pub fn validated(&self) -> Result<&str> {
        let raw = self.user_input.as_deref().unwrap_or_default();
        if raw.chars().count() > MAX_INPUT_CHARS {
            return Err(DocentError::Validation(format!(
                "Input exceeds {MAX_INPUT_CHARS} characters"
            )));
        }

        let input = raw.trim();
        if input.is_empty() {
            return Err(DocentError::Validation("No input provided".to_string()));
        }
        Ok(input)
    }
}

/// Successful answer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAnswer {
    pub message: String,
    /// Characters of document text embedded in the prompt
    pub character_count: usize,
    pub source_stats: SourceStats,
    pub timestamp: DateTime<Utc>,
}

/// Runs the full pipeline for one question
#[derive(Clone)]
pub struct ChatService {
    limiter: RateLimiter,
    fetcher: Arc<ContentFetcher>,
    prompts: PromptBuilder,
    completion: Arc<dyn CompletionProvider>,
    formatter: ResponseFormatter,
}

impl ChatService {
    pub fn new(
        limiter: RateLimiter,
        fetcher: Arc<ContentFetcher>,
        prompts: PromptBuilder,
        completion: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            limiter,
            fetcher,
            prompts,
            completion,
            formatter: ResponseFormatter::new(),
        }
    }

    pub fn fetcher(&self) -> &Arc<ContentFetcher> {
        &self.fetcher
    }

    pub async fn answer(&self, client_id: &str, query: &ChatQuery) -> Result<ChatAnswer> {
        let question = query.validated()?;

        if let Admission::Rejected { retry_after } = self.limiter.admit(client_id).await {
            return Err(DocentError::RateLimited {
                message: "Too many requests. Please wait before asking again.".to_string(),
                retry_after_secs: (retry_after.as_secs()
                    + u64::from(retry_after.subsec_nanos() > 0))
                .max(1),
            });
        }

        self.completion.ensure_configured()?;

        let document = self.fetcher.get().await;
        let prompt = self.prompts.compose(&document, question);
        debug!(
            "Prompt composed: {} document chars embedded, {:?} source",
            prompt.embedded_chars,
            document.origin()
        );

        let raw = self.completion.complete(&prompt).await?;
        let message = self.formatter.format(&raw);
        if message.is_empty() {
            return Err(DocentError::upstream(502, "No response content received"));
        }

        info!(
            "Answered question via {} ({} chars)",
            self.completion.name(),
            message.chars().count()
        );

        Ok(ChatAnswer {
            message,
            character_count: prompt.embedded_chars,
            source_stats: document.stats(),
            timestamp: Utc::now(),
        })
    }
}
