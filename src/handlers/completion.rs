//! Single-call completion handler

use crate::handlers::{HandlerError, HandlerOutput, TaskHandler};
use crate::llm::{LlmProvider, Message, ModelSettings};
use async_trait::async_trait;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that processes tasks.";

/// Thought trace reported for single-call completions
pub const DEFAULT_THOUGHT: &str =
    "Processed with default OpenAI processing (no detailed thought process available)";

/// Fallback handler: one model call, no tools
pub struct DefaultCompletion {
    llm: Arc<dyn LlmProvider>,
    settings: ModelSettings,
}

impl DefaultCompletion {
    pub fn new(llm: Arc<dyn LlmProvider>, settings: ModelSettings) -> Self {
        Self { llm, settings }
    }
}

#[async_trait]
impl TaskHandler for DefaultCompletion {
    fn name(&self) -> &str {
        "default"
    }

    async fn handle(&self, task: &str) -> Result<HandlerOutput, HandlerError> {
        let request = self.settings.request(vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(format!("Task: {task}")),
        ]);

        let result = self.llm.complete(request).await?.text()?;
        Ok(HandlerOutput::new(result).with_thoughts(DEFAULT_THOUGHT))
    }
}
