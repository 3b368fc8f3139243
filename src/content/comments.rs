//! Iteration feedback collection from page and inline comments

use crate::notion::DocumentStore;
use tracing::{debug, error};

/// Collect page-level and block-level comments on a page
///
/// Returns `None` when the page carries no comment text at all. Failures to
/// list comments for the page or for an individual block are logged and
/// skipped.
pub async fn collect_comments(store: &dyn DocumentStore, page_id: &str) -> Option<Vec<String>> {
    let mut comments = Vec::new();

    match store.list_comments(page_id).await {
        Ok(texts) => comments.extend(
            texts
                .into_iter()
                .filter(|text| !text.is_empty())
                .map(|text| format!("Page comment: {text}")),
        ),
        Err(e) => error!(page_id = %page_id, error = %e, "Failed to list page comments"),
    }

    let blocks = match store.get_children(page_id).await {
        Ok(blocks) => blocks,
        Err(e) => {
            error!(page_id = %page_id, error = %e, "Failed to list page blocks");
            Vec::new()
        }
    };

    for block in blocks {
        let texts = match store.list_comments(&block.id).await {
            Ok(texts) => texts,
            Err(e) => {
                error!(block_id = %block.id, error = %e, "Failed to list block comments");
                continue;
            }
        };

        for text in texts.into_iter().filter(|text| !text.is_empty()) {
            if block.text.is_empty() {
                comments.push(format!("Inline comment: {text}"));
            } else {
                comments.push(format!("Inline comment on '{}': {text}", block.text));
            }
        }
    }

    debug!(page_id = %page_id, count = comments.len(), "Collected comments");
    if comments.is_empty() {
        None
    } else {
        Some(comments)
    }
}

/// Prompt for an iteration run from the task title and its feedback
pub fn build_feedback_prompt(title: &str, comments: &[String]) -> String {
    let mut prompt = format!("Original task: {title}\n\nFeedback comments:\n");
    for comment in comments {
        prompt.push_str(&format!("- {comment}\n"));
    }
    prompt
}
