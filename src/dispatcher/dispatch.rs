//! Page state machine
//!
//! `Execute -> In progress -> Review` on success and `-> Error` on failure.
//! `Iterate` pages follow the same path with their comments as feedback, or
//! go straight to `Review` when nobody commented. A failing page never stops
//! the rest of the batch.

use crate::config::StatusNames;
use crate::content::{
    build_feedback_prompt, collect_comments, BlockBuilder, PageSynchronizer, StatusFieldUpdater,
    SyncOutcome, STORE_TEXT_LIMIT,
};
use crate::dispatcher::shutdown::Shutdown;
use crate::error::{sanitize_error_message, TaskRunnerError, TaskRunnerResult};
use crate::handlers::{HandlerError, HandlerOutput, TaskHandler};
use crate::notion::{DocumentStore, Page, PageStatus, StoreError};
use crate::observability::metrics::metrics;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Instrument};

/// How a page left the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Result written in full, page in Review
    Completed,
    /// Result written without its thought process, page in Review
    Degraded,
    /// Iterate page without comments, moved to Review untouched
    NoFeedback,
    /// Page moved to Error with this message
    Failed(String),
    /// Page could not be claimed and stays in its actionable status
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReport {
    pub page_id: String,
    pub title: Option<String>,
    pub outcome: PageOutcome,
}

/// Reports for every page touched in one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub execute: Vec<PageReport>,
    pub iterate: Vec<PageReport>,
    /// Queues whose query failed and were treated as empty
    pub query_failures: usize,
}

impl CycleReport {
    pub fn pages(&self) -> impl Iterator<Item = &PageReport> {
        self.execute.iter().chain(self.iterate.iter())
    }

    pub fn total(&self) -> usize {
        self.execute.len() + self.iterate.len()
    }

    pub fn count(&self, matches: impl Fn(&PageOutcome) -> bool) -> usize {
        self.pages().filter(|report| matches(&report.outcome)).count()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages ({} execute, {} iterate): {} completed, {} degraded, {} no feedback, {} failed, {} skipped",
            self.total(),
            self.execute.len(),
            self.iterate.len(),
            self.count(|o| *o == PageOutcome::Completed),
            self.count(|o| *o == PageOutcome::Degraded),
            self.count(|o| *o == PageOutcome::NoFeedback),
            self.count(|o| matches!(o, PageOutcome::Failed(_))),
            self.count(|o| matches!(o, PageOutcome::Skipped(_))),
        )?;
        if self.query_failures > 0 {
            write!(f, ", {} queue queries failed", self.query_failures)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Execute,
    Iterate,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Execute => "execute",
            Mode::Iterate => "iterate",
        })
    }
}

/// Dispatcher settings taken from the configuration
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub title_property: String,
    pub statuses: StatusNames,
    pub handler_timeout: Duration,
    pub chunk_size: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            title_property: "Task".to_string(),
            statuses: StatusNames::default(),
            handler_timeout: Duration::from_secs(300),
            chunk_size: crate::content::MAX_CHUNK,
        }
    }
}

pub struct TaskDispatcher {
    store: Arc<dyn DocumentStore>,
    handler: Arc<dyn TaskHandler>,
    synchronizer: PageSynchronizer,
    status: StatusFieldUpdater,
    title_property: String,
    handler_timeout: Duration,
    shutdown: Arc<Shutdown>,
}

impl TaskDispatcher {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        handler: Arc<dyn TaskHandler>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            synchronizer: PageSynchronizer::new(
                store.clone(),
                BlockBuilder::new(settings.chunk_size),
            ),
            status: StatusFieldUpdater::new(store.clone(), settings.statuses),
            store,
            handler,
            title_property: settings.title_property,
            handler_timeout: settings.handler_timeout,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    /// Stop between pages once `shutdown` is triggered
    pub fn with_shutdown(mut self, shutdown: Arc<Shutdown>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown(&self) -> &Arc<Shutdown> {
        &self.shutdown
    }

    /// Process the Execute queue, then the Iterate queue
    ///
    /// Fails only when both queue queries fail.
    pub async fn run_cycle(&self) -> TaskRunnerResult<CycleReport> {
        let mut report = CycleReport::default();
        let mut last_query_error = None;

        for mode in [Mode::Execute, Mode::Iterate] {
            if self.shutdown.is_triggered() {
                break;
            }

            let pages = match self.fetch_queue(mode).await {
                Ok(pages) => pages,
                Err(e) => {
                    report.query_failures += 1;
                    last_query_error = Some(e);
                    continue;
                }
            };

            for page in pages {
                if self.shutdown.is_triggered() {
                    info!("Shutdown requested, leaving remaining pages for the next run");
                    break;
                }
                let page_report = self.process_page(&page, mode).await;
                match mode {
                    Mode::Execute => report.execute.push(page_report),
                    Mode::Iterate => report.iterate.push(page_report),
                }
            }
        }

        match last_query_error {
            Some(e) if report.query_failures == 2 => Err(TaskRunnerError::Store(e)),
            _ => Ok(report),
        }
    }

    async fn fetch_queue(&self, mode: Mode) -> Result<Vec<Page>, StoreError> {
        let status = match mode {
            Mode::Execute => PageStatus::Execute,
            Mode::Iterate => PageStatus::Iterate,
        };
        let status_name = self.status.names().name(status);

        match self.store.query_pages(status_name).await {
            Ok(pages) => {
                info!(status = %status_name, pages = pages.len(), "Fetched queue");
                Ok(pages)
            }
            Err(e) => {
                error!(status = %status_name, error = %e, "Queue query failed, treating as empty");
                Err(e)
            }
        }
    }

    async fn process_page(&self, page: &Page, mode: Mode) -> PageReport {
        let span = crate::page_span!(page_id = %page.id, mode = %mode);
        metrics().page_started();
        let started = Instant::now();
        let title = page.title(&self.title_property);

        let outcome = self
            .process_inner(page, title.as_deref(), mode)
            .instrument(span)
            .await;

        let elapsed = started.elapsed();
        match &outcome {
            PageOutcome::Completed => metrics().page_completed(elapsed),
            PageOutcome::Degraded => metrics().page_degraded(elapsed),
            PageOutcome::NoFeedback => metrics().page_no_feedback(elapsed),
            PageOutcome::Failed(_) => metrics().page_failed(elapsed),
            PageOutcome::Skipped(_) => metrics().page_skipped(),
        }

        PageReport {
            page_id: page.id.clone(),
            title,
            outcome,
        }
    }

    async fn process_inner(&self, page: &Page, title: Option<&str>, mode: Mode) -> PageOutcome {
        let page_id = page.id.as_str();

        let Some(title) = title else {
            let error = TaskRunnerError::invalid_page(
                page_id,
                format!("missing or empty '{}' property", self.title_property),
            );
            return self.fail(page_id, &error.to_string()).await;
        };

        if let Err(e) = self
            .status
            .set_status(page_id, PageStatus::InProgress, None)
            .await
        {
            warn!(error = %e, "Could not mark page in progress, skipping");
            return PageOutcome::Skipped(e.to_string());
        }
        info!(title = %title, last_edited = ?page.last_edited_time, "Processing page");

        let task = match mode {
            Mode::Execute => title.to_string(),
            Mode::Iterate => match collect_comments(self.store.as_ref(), page_id).await {
                Some(comments) => build_feedback_prompt(title, &comments),
                None => return self.finish_without_feedback(page_id).await,
            },
        };

        let output = match self.invoke_handler(&task).await {
            Ok(output) => output,
            Err(e) => return self.fail(page_id, &e.to_string()).await,
        };

        self.deliver(page_id, &output, mode == Mode::Iterate).await
    }

    async fn finish_without_feedback(&self, page_id: &str) -> PageOutcome {
        warn!("No comments found for iteration, moving page to review");
        match self
            .status
            .set_status(page_id, PageStatus::Review, None)
            .await
        {
            Ok(()) => PageOutcome::NoFeedback,
            Err(e) => self.fail_keeping_body(page_id, &e.to_string()).await,
        }
    }

    async fn invoke_handler(&self, task: &str) -> Result<HandlerOutput, HandlerError> {
        match tokio::time::timeout(self.handler_timeout, self.handler.handle(task)).await {
            Ok(result) => result,
            Err(_) => {
                metrics().handler_timed_out();
                Err(HandlerError::Timeout(self.handler_timeout))
            }
        }
    }

    /// Write the handler output to the body, then move the page to Review
    async fn deliver(&self, page_id: &str, output: &HandlerOutput, is_iteration: bool) -> PageOutcome {
        let blocks = self.synchronizer.builder().build(
            &output.result,
            output.thought_process.as_deref(),
            is_iteration,
        );

        let sync_outcome = match self.synchronizer.synchronize(page_id, &blocks).await {
            Ok(outcome) => outcome,
            Err(e) => return self.fail(page_id, &e.to_string()).await,
        };

        if let Err(e) = self
            .status
            .set_status(page_id, PageStatus::Review, Some(&output.result))
            .await
        {
            return self.fail_keeping_body(page_id, &e.to_string()).await;
        }

        match sync_outcome {
            SyncOutcome::Complete => {
                info!(blocks = blocks.len(), "Page completed");
                PageOutcome::Completed
            }
            SyncOutcome::Degraded { dropped_blocks } => {
                warn!(dropped_blocks, "Page completed without thought process");
                PageOutcome::Degraded
            }
        }
    }

    /// Error status with summary, then the error banner; both best effort
    async fn fail(&self, page_id: &str, message: &str) -> PageOutcome {
        let message = sanitize_error_message(message, STORE_TEXT_LIMIT);
        error!(error = %message, "Page failed");

        if let Err(e) = self.status.record_error(page_id, &message).await {
            error!(error = %e, "Failed to set error status");
        }
        if let Err(e) = self
            .synchronizer
            .append_error_banner(page_id, &message)
            .await
        {
            error!(error = %e, "Failed to write error banner");
        }

        PageOutcome::Failed(message)
    }

    /// Error status only; the body already holds content that must survive
    async fn fail_keeping_body(&self, page_id: &str, message: &str) -> PageOutcome {
        let message = sanitize_error_message(message, STORE_TEXT_LIMIT);
        error!(error = %message, "Page failed after its body was written");

        if let Err(e) = self.status.record_error(page_id, &message).await {
            error!(error = %e, "Failed to set error status");
        }

        PageOutcome::Failed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notion::ContentBlock;
    use crate::testing::mocks::{MockDocumentStore, MockHandler};

    fn dispatcher(store: Arc<MockDocumentStore>, handler: Arc<MockHandler>) -> TaskDispatcher {
        TaskDispatcher::new(store, handler, DispatchSettings::default())
    }

    #[tokio::test]
    async fn test_execute_page_completes() {
        let store = Arc::new(MockDocumentStore::new());
        store.add_page("p1", "Summarize RFC 9110", "Execute").await;
        let handler = Arc::new(MockHandler::succeeding("mock", "Summary").with_thoughts("steps"));

        let report = dispatcher(store.clone(), handler.clone())
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(report.execute[0].outcome, PageOutcome::Completed);
        assert_eq!(report.execute[0].title.as_deref(), Some("Summarize RFC 9110"));
        assert_eq!(handler.get_tasks().await, vec!["Summarize RFC 9110"]);
        assert_eq!(
            store.status_history("p1").await,
            vec![
                ("In progress".to_string(), None),
                ("Review".to_string(), Some("Summary".to_string())),
            ]
        );
        assert_eq!(
            store.body("p1").await,
            vec![
                ContentBlock::heading("AI Response"),
                ContentBlock::paragraph("Summary"),
                ContentBlock::Divider,
                ContentBlock::heading("Thought Process"),
                ContentBlock::paragraph("steps"),
            ]
        );
    }

    #[tokio::test]
    async fn test_untitled_page_fails_without_handler_call() {
        let store = Arc::new(MockDocumentStore::new());
        store.add_untitled_page("p1", "Execute").await;
        let handler = Arc::new(MockHandler::succeeding("mock", "x"));

        let report = dispatcher(store.clone(), handler.clone())
            .run_cycle()
            .await
            .unwrap();

        assert!(matches!(&report.execute[0].outcome, PageOutcome::Failed(m) if m.contains("Invalid page")));
        assert!(handler.get_tasks().await.is_empty());
        assert_eq!(store.status_of("p1").await.as_deref(), Some("Error"));
    }

    #[tokio::test]
    async fn test_claim_failure_skips_page() {
        let store = Arc::new(MockDocumentStore::new());
        store.add_page("p1", "Task one", "Execute").await;
        store.fail_status_update("p1", "In progress").await;
        let handler = Arc::new(MockHandler::succeeding("mock", "x"));

        let report = dispatcher(store.clone(), handler.clone())
            .run_cycle()
            .await
            .unwrap();

        assert!(matches!(report.execute[0].outcome, PageOutcome::Skipped(_)));
        assert!(handler.get_tasks().await.is_empty());
        assert_eq!(store.status_of("p1").await.as_deref(), Some("Execute"));
    }

    #[tokio::test]
    async fn test_single_query_failure_keeps_other_queue() {
        let store = Arc::new(MockDocumentStore::new());
        store.add_page("p1", "Task one", "Iterate").await;
        store.add_comment("p1", "shorter please").await;
        store.fail_query("Execute").await;
        let handler = Arc::new(MockHandler::succeeding("mock", "x"));

        let report = dispatcher(store, handler).run_cycle().await.unwrap();
        assert_eq!(report.query_failures, 1);
        assert_eq!(report.iterate[0].outcome, PageOutcome::Completed);
    }

    #[tokio::test]
    async fn test_both_query_failures_fail_the_cycle() {
        let store = Arc::new(MockDocumentStore::new());
        store.fail_query("Execute").await;
        store.fail_query("Iterate").await;
        let handler = Arc::new(MockHandler::succeeding("mock", "x"));

        let result = dispatcher(store, handler).run_cycle().await;
        assert!(matches!(result, Err(TaskRunnerError::Store(_))));
    }

    #[tokio::test]
    async fn test_shutdown_stops_before_pages() {
        let store = Arc::new(MockDocumentStore::new());
        store.add_page("p1", "Task one", "Execute").await;
        let handler = Arc::new(MockHandler::succeeding("mock", "x"));
        let shutdown = Arc::new(Shutdown::new());
        shutdown.trigger();

        let report = dispatcher(store.clone(), handler.clone())
            .with_shutdown(shutdown)
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(report.total(), 0);
        assert!(handler.get_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_processing_a_page_stamps_poll_activity() {
        let store = Arc::new(MockDocumentStore::new());
        store.add_page("p1", "Task", "Execute").await;
        let handler = Arc::new(MockHandler::succeeding("mock", "done"));

        dispatcher(store, handler).run_cycle().await.unwrap();

        assert!(metrics().snapshot().poller.last_activity_at > 0);
    }

    #[test]
    fn test_cycle_report_display() {
        let report = CycleReport {
            execute: vec![PageReport {
                page_id: "p1".to_string(),
                title: None,
                outcome: PageOutcome::Completed,
            }],
            iterate: vec![PageReport {
                page_id: "p2".to_string(),
                title: None,
                outcome: PageOutcome::Failed("boom".to_string()),
            }],
            query_failures: 1,
        };

        assert_eq!(
            report.to_string(),
            "2 pages (1 execute, 1 iterate): 1 completed, 0 degraded, 0 no feedback, 1 failed, 0 skipped, 1 queue queries failed"
        );
    }
}
