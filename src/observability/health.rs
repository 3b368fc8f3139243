//! Health check HTTP server
//!
//! `/health` reports whether the poll loop is still making progress, `/metrics`
//! exports the metrics snapshot and `/live` is a bare liveness probe.

use crate::observability::metrics::metrics;
use serde::Serialize;
use std::convert::Infallible;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use warp::http::StatusCode;
use warp::Filter;

/// HTTP health check server
pub struct HealthServer {
    port: u16,
    stale_after: Duration,
}

impl HealthServer {
    /// `poll_interval` and `handler_timeout` bound how long a healthy loop can go
    /// without starting a cycle or a page
    pub fn new(port: u16, poll_interval: Duration, handler_timeout: Duration) -> Self {
        Self {
            port,
            stale_after: poll_interval * 2 + handler_timeout,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// All routes served by the health server
    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        let stale_after = self.stale_after;

        let health = warp::path("health")
            .and(warp::path::end())
            .and(warp::get())
            .and_then(move || async move {
                let last_activity_at = metrics().snapshot().poller.last_activity_at;
                let status = evaluate_poller(last_activity_at, current_timestamp(), stale_after);
                let code = if status.healthy {
                    StatusCode::OK
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                };
                Ok::<_, Infallible>(warp::reply::with_status(warp::reply::json(&status), code))
            });

        let metrics_route = warp::path("metrics")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| warp::reply::json(&metrics().snapshot()));

        let live = warp::path("live")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| {
                warp::reply::json(&LivenessResponse {
                    alive: true,
                    timestamp: current_timestamp(),
                })
            });

        health.or(metrics_route).or(live)
    }

    /// Serve until the task is dropped
    pub async fn start(self) {
        tracing::info!(port = self.port, "Starting health server");
        let routes = self.routes();
        warp::serve(routes).run(([0, 0, 0, 0], self.port)).await;
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PollerHealth {
    pub healthy: bool,
    pub status: String,
    pub last_activity_at: u64,
    pub timestamp: u64,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct LivenessResponse {
    alive: bool,
    timestamp: u64,
}

/// Judge poll loop health from its last cycle or page start (pure function)
pub fn evaluate_poller(last_activity_at: u64, now: u64, stale_after: Duration) -> PollerHealth {
    let (healthy, status, message) = if last_activity_at == 0 {
        (true, "starting", "No poll cycle has run yet".to_string())
    } else {
        let idle = now.saturating_sub(last_activity_at);
        if idle > stale_after.as_secs() {
            (false, "stale", format!("No poll activity for {idle} seconds"))
        } else {
            (true, "healthy", format!("Last poll activity {idle} seconds ago"))
        }
    };

    PollerHealth {
        healthy,
        status: status.to_string(),
        last_activity_at,
        timestamp: now,
        message,
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
