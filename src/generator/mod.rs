//! Code generator adapter.
//!
//! Turns a task brief into the source of a single self-contained HTML page.
//! Failures propagate: there is no fallback page, so a broken generation
//! shows up as a failed task rather than a silently published placeholder.

mod prompt;

pub use prompt::{build_prompt, strip_code_fences, ALLOWED_CDN};

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{ChatMessage, ChatOptions, LlmClient, LlmError};

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Generation request failed: {0}")]
    Llm(#[from] LlmError),
    #[error("Generation returned no content")]
    Empty,
}

/// Produces application source for a task.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn generate(
        &self,
        brief: &str,
        checks: &[String],
        attachments: &[Value],
    ) -> Result<String, GenerationError>;
}

/// Generator backed by a chat-completion model.
pub struct LlmCodeGenerator {
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl LlmCodeGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }
}

#[async_trait]
impl CodeGenerator for LlmCodeGenerator {
    async fn generate(
        &self,
        brief: &str,
        checks: &[String],
        attachments: &[Value],
    ) -> Result<String, GenerationError> {
        let messages = [
            ChatMessage::system(prompt::SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(brief, checks, attachments)),
        ];

        let response = self
            .llm
            .chat_completion(&self.model, &messages, ChatOptions::default())
            .await?;

        let raw = response.content.unwrap_or_default();
        let code = strip_code_fences(&raw);
        if code.is_empty() {
            return Err(GenerationError::Empty);
        }

        tracing::debug!(
            model = response.model.as_deref().unwrap_or(&self.model),
            bytes = code.len(),
            "Generated application source"
        );
        Ok(code.to_string())
    }
}
