//! LLM client seam. The service only needs "prompt in, text out".

pub mod anthropic;

use async_trait::async_trait;

use crate::error::AnalysisError;
use crate::protocol::Prompt;

pub use anthropic::AnthropicClient;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one prompt and return the model's text reply.
    ///
    /// Transport and provider failures surface as [`AnalysisError::Upstream`].
    async fn complete(&self, prompt: &Prompt) -> Result<String, AnalysisError>;
}
