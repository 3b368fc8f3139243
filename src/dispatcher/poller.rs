//! Periodic polling loop around [`TaskDispatcher::run_cycle`]

use crate::dispatcher::dispatch::{CycleReport, TaskDispatcher};
use crate::dispatcher::shutdown::Shutdown;
use crate::error::TaskRunnerResult;
use crate::observability::metrics::metrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Instrument};
use uuid::Uuid;

pub struct Poller {
    dispatcher: Arc<TaskDispatcher>,
    interval: Duration,
    error_backoff: Duration,
}

impl Poller {
    pub fn new(dispatcher: Arc<TaskDispatcher>, interval: Duration, error_backoff: Duration) -> Self {
        Self {
            dispatcher,
            interval,
            error_backoff,
        }
    }

    pub fn shutdown(&self) -> &Arc<Shutdown> {
        self.dispatcher.shutdown()
    }

    /// Run a single cycle
    pub async fn run_once(&self) -> TaskRunnerResult<CycleReport> {
        metrics().cycle_started();
        let cycle_id = Uuid::new_v4();
        let span = crate::cycle_span!(cycle_id = %cycle_id);

        let result = self.dispatcher.run_cycle().instrument(span).await;
        match &result {
            Ok(report) => info!(%report, "Cycle finished"),
            Err(e) => {
                metrics().cycle_failed();
                error!(error = %e, "Cycle failed");
            }
        }
        result
    }

    /// Run cycles until shutdown is triggered
    ///
    /// Sleeps `interval` after a successful cycle and `error_backoff` after a
    /// failed one. A shutdown during a cycle lets the current page finish.
    pub async fn run(&self) {
        info!(
            interval_secs = self.interval.as_secs(),
            error_backoff_secs = self.error_backoff.as_secs(),
            "Poller started"
        );

        let shutdown = self.shutdown().clone();
        while !shutdown.is_triggered() {
            let pause = match self.run_once().await {
                Ok(_) => self.interval,
                Err(_) => self.error_backoff,
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.wait() => {}
            }
        }

        info!("Poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DispatchSettings;
    use crate::testing::mocks::{MockDocumentStore, MockHandler};

    fn poller(store: Arc<MockDocumentStore>, handler: Arc<MockHandler>) -> Poller {
        let dispatcher = TaskDispatcher::new(store, handler, DispatchSettings::default());
        Poller::new(
            Arc::new(dispatcher),
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        )
    }

    #[tokio::test]
    async fn test_run_once_processes_queue() {
        let store = Arc::new(MockDocumentStore::new());
        store.add_page("p1", "Task one", "Execute").await;
        let handler = Arc::new(MockHandler::succeeding("mock", "done"));

        let report = poller(store.clone(), handler).run_once().await.unwrap();
        assert_eq!(report.total(), 1);
        assert_eq!(store.status_of("p1").await.as_deref(), Some("Review"));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_during_sleep() {
        let store = Arc::new(MockDocumentStore::new());
        let handler = Arc::new(MockHandler::succeeding("mock", "done"));
        let poller = Arc::new(poller(store, handler));

        let running = {
            let poller = poller.clone();
            tokio::spawn(async move { poller.run().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        poller.shutdown().trigger();

        tokio::time::timeout(Duration::from_secs(1), running)
            .await
            .expect("poller should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_cycle_is_reported() {
        let store = Arc::new(MockDocumentStore::new());
        store.fail_query("Execute").await;
        store.fail_query("Iterate").await;
        let handler = Arc::new(MockHandler::succeeding("mock", "done"));

        assert!(poller(store, handler).run_once().await.is_err());
    }
}
