//! Status and response-summary property updates

use crate::config::StatusNames;
use crate::content::chunker::STORE_TEXT_LIMIT;
use crate::error::sanitize_error_message;
use crate::notion::{DocumentStore, PageStatus, StoreError};
use std::sync::Arc;
use tracing::debug;

/// Updates page metadata without touching the page body
pub struct StatusFieldUpdater {
    store: Arc<dyn DocumentStore>,
    names: StatusNames,
}

impl StatusFieldUpdater {
    pub fn new(store: Arc<dyn DocumentStore>, names: StatusNames) -> Self {
        Self { store, names }
    }

    pub fn names(&self) -> &StatusNames {
        &self.names
    }

    /// Set the status, and the summary truncated to the field limit when given
    pub async fn set_status(
        &self,
        page_id: &str,
        status: PageStatus,
        summary: Option<&str>,
    ) -> Result<(), StoreError> {
        let name = self.names.name(status);
        let summary = summary.map(|s| truncate_chars(s, STORE_TEXT_LIMIT));
        debug!(
            page_id = %page_id,
            status = %name,
            summary_len = summary.as_ref().map(|s| s.chars().count()).unwrap_or(0),
            "Updating page status"
        );

        self.store
            .update_status(page_id, name, summary.as_deref())
            .await
    }

    /// Move the page to the error status with a sanitized `Error: ...` summary
    pub async fn record_error(&self, page_id: &str, message: &str) -> Result<(), StoreError> {
        let summary = format!("Error: {}", sanitize_error_message(message, STORE_TEXT_LIMIT));
        self.set_status(page_id, PageStatus::Error, Some(&summary))
            .await
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
