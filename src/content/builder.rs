//! Page body assembly from a handler result

use crate::content::chunker::{chunk, truncate_with_marker, MAX_CHUNK};
use crate::notion::{CalloutStyle, ContentBlock};
use tracing::debug;

pub const RESPONSE_HEADING: &str = "AI Response";
pub const ITERATION_HEADING: &str = "AI Response (Iteration)";
pub const THOUGHT_HEADING: &str = "Thought Process";

/// Everything needed to render one page body
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub response_text: String,
    pub thought_process: Option<String>,
    pub is_iteration: bool,
}

impl RenderRequest {
    pub fn new(response_text: impl Into<String>, thought_process: Option<String>) -> Self {
        Self {
            response_text: response_text.into(),
            thought_process,
            is_iteration: false,
        }
    }

    pub fn iteration(mut self, is_iteration: bool) -> Self {
        self.is_iteration = is_iteration;
        self
    }

    /// Thought process text when present and non-empty
    pub fn thoughts(&self) -> Option<&str> {
        self.thought_process.as_deref().filter(|t| !t.is_empty())
    }
}

/// Converts results into ordered content blocks
#[derive(Debug, Clone, Copy)]
pub struct BlockBuilder {
    chunk_size: usize,
}

impl Default for BlockBuilder {
    fn default() -> Self {
        Self {
            chunk_size: MAX_CHUNK,
        }
    }
}

impl BlockBuilder {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Heading, response paragraphs, then divider + thought section if any
    pub fn build(
        &self,
        response_text: &str,
        thought_process: Option<&str>,
        is_iteration: bool,
    ) -> Vec<ContentBlock> {
        let heading = if is_iteration {
            ITERATION_HEADING
        } else {
            RESPONSE_HEADING
        };
        let mut blocks = vec![ContentBlock::heading(heading)];

        let response_chunks = chunk(response_text, self.chunk_size);
        debug!(chunks = response_chunks.len(), "Split response into chunks");
        blocks.extend(response_chunks.into_iter().map(ContentBlock::Paragraph));

        if let Some(thoughts) = thought_process.filter(|t| !t.is_empty()) {
            let thought_chunks = chunk(thoughts, self.chunk_size);
            debug!(chunks = thought_chunks.len(), "Split thought process into chunks");

            blocks.push(ContentBlock::Divider);
            blocks.push(ContentBlock::heading(THOUGHT_HEADING));
            blocks.extend(thought_chunks.into_iter().map(ContentBlock::Paragraph));
        }

        blocks
    }

    pub fn render(&self, request: &RenderRequest) -> Vec<ContentBlock> {
        self.build(
            &request.response_text,
            request.thoughts(),
            request.is_iteration,
        )
    }

    /// Single warning callout for the error path
    pub fn build_error(&self, message: &str) -> Vec<ContentBlock> {
        let text = truncate_with_marker(&format!("Error: {message}"), self.chunk_size);
        vec![ContentBlock::callout(text, CalloutStyle::Warning)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_without_thoughts() {
        let blocks = BlockBuilder::default().build(&"x".repeat(5000), None, false);

        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0], ContentBlock::heading(RESPONSE_HEADING));
        assert!(blocks[1..]
            .iter()
            .all(|b| matches!(b, ContentBlock::Paragraph(_))));
        assert!(!blocks.iter().any(ContentBlock::is_divider));
    }

    #[test]
    fn test_build_with_thoughts_orders_sections() {
        let blocks = BlockBuilder::new(4).build("abcdefgh", Some("123456"), false);

        assert_eq!(
            blocks,
            vec![
                ContentBlock::heading(RESPONSE_HEADING),
                ContentBlock::paragraph("abcd"),
                ContentBlock::paragraph("efgh"),
                ContentBlock::Divider,
                ContentBlock::heading(THOUGHT_HEADING),
                ContentBlock::paragraph("1234"),
                ContentBlock::paragraph("56"),
            ]
        );
    }

    #[test]
    fn test_empty_thoughts_are_omitted() {
        let blocks = BlockBuilder::default().build("answer", Some(""), false);
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_iteration_heading() {
        let blocks = BlockBuilder::default().build("answer", None, true);
        assert_eq!(blocks[0], ContentBlock::heading(ITERATION_HEADING));
    }

    #[test]
    fn test_empty_response_still_has_heading() {
        let blocks = BlockBuilder::default().build("", None, false);
        assert_eq!(blocks, vec![ContentBlock::heading(RESPONSE_HEADING)]);
    }

    #[test]
    fn test_render_request() {
        let request = RenderRequest::new("answer", Some("thinking".to_string())).iteration(true);
        let blocks = BlockBuilder::default().render(&request);

        assert_eq!(blocks[0], ContentBlock::heading(ITERATION_HEADING));
        assert!(blocks.iter().any(ContentBlock::is_divider));
    }

    #[test]
    fn test_build_error_is_single_warning_callout() {
        let blocks = BlockBuilder::default().build_error("LLM unavailable");

        assert_eq!(
            blocks,
            vec![ContentBlock::callout(
                "Error: LLM unavailable",
                CalloutStyle::Warning
            )]
        );
    }

    #[test]
    fn test_build_error_truncates_long_messages() {
        let blocks = BlockBuilder::default().build_error(&"z".repeat(5000));

        assert_eq!(blocks.len(), 1);
        let text = blocks[0].text().unwrap();
        assert_eq!(text.chars().count(), MAX_CHUNK);
        assert!(text.ends_with("..."));
    }
}
