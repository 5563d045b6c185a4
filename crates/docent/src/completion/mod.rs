//! Completion provider access
//!
//! A single attempt per question: completions cost money and a retry can
//! produce a second, different answer, so failures go straight back to the
//! caller.

mod client;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use crate::prompt::PromptSet;

pub use client::CompletionClient;

/// Trait for completion backends
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Fail fast when the provider cannot be called at all (missing
    /// credential). Makes no network calls.
    fn ensure_configured(&self) -> Result<()>;

    /// Send the prompt and return the answer text, which is never blank
    async fn complete(&self, prompt: &PromptSet) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
