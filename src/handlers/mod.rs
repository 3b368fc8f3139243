//! Task handlers
//!
//! A handler turns the free-text description of a task into a result text and
//! an optional thought trace. [`HandlerRegistry`] picks the handler for a task
//! through the [`TaskRouter`] and falls back to the default completion when
//! the research pipeline fails.

use crate::llm::LlmError;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub mod completion;
pub mod registry;
pub mod research;
pub mod router;
pub mod thought;

pub use completion::DefaultCompletion;
pub use registry::HandlerRegistry;
pub use research::ResearchPipeline;
pub use router::{RouteDecision, TaskRouter};
pub use thought::{StepEvent, ThoughtAccumulator};

/// Anything that can process a task description
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Short name used in logs and metrics
    fn name(&self) -> &str;

    async fn handle(&self, task: &str) -> Result<HandlerOutput, HandlerError>;
}

/// Result of a handler run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOutput {
    pub result: String,
    pub thought_process: Option<String>,
}

impl HandlerOutput {
    pub fn new(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            thought_process: None,
        }
    }

    pub fn with_thoughts(mut self, thoughts: impl Into<String>) -> Self {
        self.thought_process = Some(thoughts.into());
        self
    }
}

/// The closed set of handler kinds a task can be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Research,
    Default,
}

impl HandlerKind {
    /// Routing key the router model is asked to answer with
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerKind::Research => "research_crew",
            HandlerKind::Default => "default",
        }
    }

    /// What the router model is told this handler is for
    pub fn description(&self) -> &'static str {
        match self {
            HandlerKind::Research => {
                "For tasks requiring web research, information gathering, and synthesis"
            }
            HandlerKind::Default => "For general tasks that don't fit other specialized handlers",
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlerKind {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "research_crew" | "research" => Ok(HandlerKind::Research),
            "default" => Ok(HandlerKind::Default),
            other => Err(HandlerError::UnknownHandlerKind(other.to_string())),
        }
    }
}

/// Handler failures
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Pipeline failed: {0}")]
    Pipeline(String),

    #[error("Unknown handler kind: {0}")]
    UnknownHandlerKind(String),

    #[error("Handler timed out after {0:?}")]
    Timeout(Duration),
}
