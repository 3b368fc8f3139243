//! Remote document store abstraction and the Notion implementation
//!
//! The [`DocumentStore`] trait is the seam between the page processing core
//! and the Notion REST API, so the core can be exercised against an
//! in-memory store in tests.

use async_trait::async_trait;
use thiserror::Error;

pub mod blocks;
pub mod client;
pub mod model;

pub use blocks::{CalloutStyle, ContentBlock};
pub use client::{NotionClient, NotionClientConfig};
pub use model::{BlockRef, Page, PageStatus};

/// Remote store operations used by the task runner
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Query database rows whose status property equals `status`
    async fn query_pages(&self, status: &str) -> Result<Vec<Page>, StoreError>;

    /// List the direct children of a page or block
    async fn get_children(&self, block_id: &str) -> Result<Vec<BlockRef>, StoreError>;

    /// Delete (archive) a single block
    async fn delete_block(&self, block_id: &str) -> Result<(), StoreError>;

    /// Append blocks after the existing children of `block_id`, in order
    async fn append_blocks(&self, block_id: &str, blocks: &[ContentBlock])
        -> Result<(), StoreError>;

    /// Set the status property and, when given, the response summary property
    async fn update_status(
        &self,
        page_id: &str,
        status: &str,
        summary: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Text of every comment attached to a page or block
    async fn list_comments(&self, block_id: &str) -> Result<Vec<String>, StoreError>;

    /// Verify credentials and database access
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Remote store errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The store rejected the payload as malformed or oversized
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("API error ({status} {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// The client was built from unusable settings; nothing was sent
    #[error("Invalid store configuration: {0}")]
    Config(String),
}

impl StoreError {
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_validation_errors_are_validation() {
        assert!(StoreError::Validation("too long".to_string()).is_validation());
        assert!(!StoreError::Transport("reset".to_string()).is_validation());
        assert!(!StoreError::Api {
            status: 429,
            code: "rate_limited".to_string(),
            message: "slow down".to_string(),
        }
        .is_validation());
    }

    #[test]
    fn test_store_error_display() {
        let error = StoreError::Api {
            status: 401,
            code: "unauthorized".to_string(),
            message: "API token is invalid.".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "API error (401 unauthorized): API token is invalid."
        );
    }
}
