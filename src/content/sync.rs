//! Page body replacement with reduced-content fallback
//!
//! A page body is replaced wholesale: list the existing children, delete
//! each one, then append the new sequence. Between the delete and the append
//! the page is briefly empty.

use crate::content::builder::BlockBuilder;
use crate::notion::{ContentBlock, DocumentStore, StoreError};
use crate::observability::metrics::metrics;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn, Instrument};

/// Most children the store accepts in one append request
pub const MAX_BLOCKS_PER_APPEND: usize = 100;

/// Result of a successful synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The full block sequence was written
    Complete,
    /// The thought process section was dropped after a validation rejection
    Degraded { dropped_blocks: usize },
}

/// Synchronization failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("Failed to list existing blocks: {0}")]
    Fetch(StoreError),
    #[error("Failed to delete block {block_id}: {source}")]
    Delete { block_id: String, source: StoreError },
    #[error("Failed to append blocks: {0}")]
    Append(StoreError),
    #[error("Append rejected ({original}) and reduced fallback failed: {fallback}")]
    FallbackFailed {
        original: StoreError,
        fallback: StoreError,
    },
}

struct AppendFailure {
    error: StoreError,
    appended_batches: usize,
}

/// Replaces page bodies in the remote store
pub struct PageSynchronizer {
    store: Arc<dyn DocumentStore>,
    builder: BlockBuilder,
}

impl PageSynchronizer {
    pub fn new(store: Arc<dyn DocumentStore>, builder: BlockBuilder) -> Self {
        Self { store, builder }
    }

    pub fn builder(&self) -> &BlockBuilder {
        &self.builder
    }

    /// Replace the body of `page_id` with `blocks`
    ///
    /// When the append is rejected for validation reasons and `blocks`
    /// contains a divider, the prefix before the first divider is written
    /// instead and [`SyncOutcome::Degraded`] is returned.
    pub async fn synchronize(
        &self,
        page_id: &str,
        blocks: &[ContentBlock],
    ) -> Result<SyncOutcome, SyncError> {
        let span = crate::sync_span!(page_id = %page_id, blocks = blocks.len());
        self.synchronize_inner(page_id, blocks)
            .instrument(span)
            .await
    }

    async fn synchronize_inner(
        &self,
        page_id: &str,
        blocks: &[ContentBlock],
    ) -> Result<SyncOutcome, SyncError> {
        self.clear(page_id).await?;

        let failure = match self.append_batches(page_id, blocks).await {
            Ok(()) => {
                metrics().blocks_written(blocks.len());
                debug!("Page body replaced");
                return Ok(SyncOutcome::Complete);
            }
            Err(failure) => failure,
        };

        let divider = match blocks.iter().position(ContentBlock::is_divider) {
            Some(index) if failure.error.is_validation() => index,
            _ => return Err(SyncError::Append(failure.error)),
        };

        warn!(
            error = %failure.error,
            kept_blocks = divider,
            "Append rejected, retrying without thought process"
        );

        // Earlier batches of the rejected sequence are already on the page
        if failure.appended_batches > 0 {
            self.clear(page_id).await?;
        }

        let reduced = &blocks[..divider];
        match self.append_batches(page_id, reduced).await {
            Ok(()) => {
                let dropped_blocks = blocks.len() - divider;
                metrics().blocks_written(reduced.len());
                info!(dropped_blocks, "Fallback succeeded without thought process");
                Ok(SyncOutcome::Degraded { dropped_blocks })
            }
            Err(fallback) => Err(SyncError::FallbackFailed {
                original: failure.error,
                fallback: fallback.error,
            }),
        }
    }

    /// Replace the body of `page_id` with a single error callout
    pub async fn append_error_banner(&self, page_id: &str, message: &str) -> Result<(), SyncError> {
        let blocks = self.builder.build_error(message);
        self.synchronize(page_id, &blocks).await.map(|_| ())
    }

    /// Delete every direct child of the page
    async fn clear(&self, page_id: &str) -> Result<(), SyncError> {
        let existing = self
            .store
            .get_children(page_id)
            .await
            .map_err(SyncError::Fetch)?;

        for block in &existing {
            debug!(block_id = %block.id, "Deleting existing block");
            self.store
                .delete_block(&block.id)
                .await
                .map_err(|source| SyncError::Delete {
                    block_id: block.id.clone(),
                    source,
                })?;
        }

        Ok(())
    }

    async fn append_batches(
        &self,
        page_id: &str,
        blocks: &[ContentBlock],
    ) -> Result<(), AppendFailure> {
        for (appended_batches, batch) in blocks.chunks(MAX_BLOCKS_PER_APPEND).enumerate() {
            self.store
                .append_blocks(page_id, batch)
                .await
                .map_err(|error| AppendFailure {
                    error,
                    appended_batches,
                })?;
        }
        Ok(())
    }
}
