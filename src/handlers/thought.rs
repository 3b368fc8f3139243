//! Thought trace recording
//!
//! Each handler invocation owns one [`ThoughtAccumulator`] and records the
//! steps it takes as [`StepEvent`]s. The rendered trace becomes the
//! "Thought Process" section of the page.

use tracing::{debug, warn};

/// Longest single rendered entry, in chars, before truncation
pub const MAX_ENTRY_CHARS: usize = 10_000;

const ENTRY_TRUNCATION_MARKER: &str = "... [truncated due to length]";

/// One observable step of a handler run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEvent {
    /// A pipeline step finished with this output
    Output(String),
    /// A tool returned this result
    ToolResult(String),
    /// Intermediate model content
    Content(String),
    /// Anything else, such as the tool invocation itself
    Raw(String),
}

impl StepEvent {
    /// Render the event as a trace entry, truncated to [`MAX_ENTRY_CHARS`]
    pub fn render(&self) -> String {
        let entry = match self {
            StepEvent::Output(text) => format!("Task completed!\nOutput: {text}\n"),
            StepEvent::ToolResult(text) => format!("Tool result: {text}\n"),
            StepEvent::Content(text) => format!("Content: {text}\n"),
            StepEvent::Raw(text) => format!("Tool used: {text}\n"),
        };

        let len = entry.chars().count();
        if len <= MAX_ENTRY_CHARS {
            return entry;
        }

        warn!(chars = len, "Truncating long thought entry");
        let mut truncated: String = entry.chars().take(MAX_ENTRY_CHARS).collect();
        truncated.push_str(ENTRY_TRUNCATION_MARKER);
        truncated
    }
}

/// Ordered trace of one handler invocation
#[derive(Debug, Clone, Default)]
pub struct ThoughtAccumulator {
    entries: Vec<String>,
}

impl ThoughtAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: StepEvent) {
        let entry = event.render();
        debug!(chars = entry.chars().count(), "Thought entry recorded");
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries joined with newlines, `None` when nothing was recorded
    pub fn finish(self) -> Option<String> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.join("\n"))
        }
    }
}
