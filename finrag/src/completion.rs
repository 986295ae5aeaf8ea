//! Text-completion seam used to generate tier analyses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single completion call: one system instruction and one user message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    pub system_instruction: String,
    pub user_content: String,
    pub temperature: f32,
}

/// A language-model backend that turns a [`CompletionRequest`] into text.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}
