//! Handler selection: route, run, fall back

use crate::handlers::{HandlerError, HandlerKind, HandlerOutput, TaskHandler, TaskRouter};
use crate::observability::metrics::metrics;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Maps handler kinds to handlers and applies the fallback policy
///
/// The registry is itself a [`TaskHandler`], so the dispatcher only ever
/// sees one handler.
pub struct HandlerRegistry {
    router: TaskRouter,
    handlers: HashMap<HandlerKind, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    /// Registry with the default completion handler registered
    pub fn new(router: TaskRouter, default: Arc<dyn TaskHandler>) -> Self {
        let mut handlers: HashMap<HandlerKind, Arc<dyn TaskHandler>> = HashMap::new();
        handlers.insert(HandlerKind::Default, default);
        Self { router, handlers }
    }

    pub fn register(mut self, kind: HandlerKind, handler: Arc<dyn TaskHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    pub fn kinds(&self) -> Vec<HandlerKind> {
        let mut kinds: Vec<HandlerKind> = self.handlers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }

    fn handler(&self, kind: HandlerKind) -> Result<&Arc<dyn TaskHandler>, HandlerError> {
        self.handlers
            .get(&kind)
            .ok_or_else(|| HandlerError::UnknownHandlerKind(kind.to_string()))
    }

    /// Run the handler registered for `kind`, falling back to the default one if research fails
    pub async fn run(&self, kind: HandlerKind, task: &str) -> Result<HandlerOutput, HandlerError> {
        let handler = self.handler(kind)?;
        let result = timed(handler.as_ref(), task).await;

        match (kind, result) {
            (HandlerKind::Research, Err(e)) => {
                warn!(error = %e, "Research failed, falling back to default completion");
                let fallback = self.handler(HandlerKind::Default)?;
                timed(fallback.as_ref(), task).await
            }
            (_, result) => result,
        }
    }
}

async fn timed(handler: &dyn TaskHandler, task: &str) -> Result<HandlerOutput, HandlerError> {
    let started = Instant::now();
    let result = handler.handle(task).await;
    metrics().handler_invoked(handler.name(), started.elapsed(), result.is_ok());
    result
}

#[async_trait]
impl TaskHandler for HandlerRegistry {
    fn name(&self) -> &str {
        "registry"
    }

    async fn handle(&self, task: &str) -> Result<HandlerOutput, HandlerError> {
        let decision = self.router.route(task, &self.kinds()).await?;
        info!(kind = %decision.kind, "Dispatching task to handler");
        self.run(decision.kind, task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ModelSettings;
    use crate::testing::mocks::{MockHandler, MockLlmProvider};

    fn router(answer: &str) -> TaskRouter {
        TaskRouter::new(
            Arc::new(MockLlmProvider::single_response(answer)),
            ModelSettings::new("gpt-4o-mini"),
        )
    }

    #[tokio::test]
    async fn test_routes_to_research() {
        let research = Arc::new(MockHandler::succeeding("research", "report"));
        let default = Arc::new(MockHandler::succeeding("default", "plain"));
        let registry = HandlerRegistry::new(router("research_crew: sources needed"), default.clone())
            .register(HandlerKind::Research, research.clone());

        let output = registry.handle("Survey Rust ORMs").await.unwrap();
        assert_eq!(output.result, "report");
        assert_eq!(research.get_tasks().await, vec!["Survey Rust ORMs"]);
        assert!(default.get_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_research_failure_falls_back_to_default() {
        let research = Arc::new(MockHandler::failing("research", "search quota"));
        let default = Arc::new(MockHandler::succeeding("default", "plain"));
        let registry = HandlerRegistry::new(router("research_crew: x"), default.clone())
            .register(HandlerKind::Research, research.clone());

        let output = registry.handle("task").await.unwrap();
        assert_eq!(output.result, "plain");
        assert_eq!(research.get_tasks().await.len(), 1);
        assert_eq!(default.get_tasks().await.len(), 1);
    }

    #[tokio::test]
    async fn test_default_failure_is_not_retried() {
        let default = Arc::new(MockHandler::failing("default", "model down"));
        let registry = HandlerRegistry::new(router("default: general"), default.clone());

        assert!(registry.handle("task").await.is_err());
        assert_eq!(default.get_tasks().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unregistered_research_is_unknown_kind() {
        let default = Arc::new(MockHandler::succeeding("default", "plain"));
        let registry = HandlerRegistry::new(router("research_crew: x"), default.clone());

        let result = registry.handle("task").await;
        assert!(matches!(result, Err(HandlerError::UnknownHandlerKind(k)) if k == "research_crew"));
        assert!(default.get_tasks().await.is_empty());
        assert_eq!(registry.kinds(), vec![HandlerKind::Default]);
    }

    #[tokio::test]
    async fn test_router_is_only_offered_registered_kinds() {
        let llm = Arc::new(MockLlmProvider::single_response("default: general"));
        let router = TaskRouter::new(llm.clone(), ModelSettings::new("gpt-4o-mini"));
        let default = Arc::new(MockHandler::succeeding("default", "plain"));
        let registry = HandlerRegistry::new(router, default.clone());

        let output = registry.handle("Survey Rust ORMs").await.unwrap();
        assert_eq!(output.result, "plain");

        let requests = llm.get_requests().await;
        let system = &requests[0].messages[0].content;
        assert!(system.contains("default"));
        assert!(!system.contains("research_crew"));
    }

    #[tokio::test]
    async fn test_router_sees_research_once_registered() {
        let llm = Arc::new(MockLlmProvider::single_response("default: general"));
        let router = TaskRouter::new(llm.clone(), ModelSettings::new("gpt-4o-mini"));
        let registry = HandlerRegistry::new(router, Arc::new(MockHandler::succeeding("default", "plain")))
            .register(HandlerKind::Research, Arc::new(MockHandler::succeeding("research", "r")));

        registry.handle("task").await.unwrap();

        let requests = llm.get_requests().await;
        assert!(requests[0].messages[0].content.contains("research_crew"));
    }

    #[tokio::test]
    async fn test_unparsable_route_is_unknown_kind() {
        let default = Arc::new(MockHandler::succeeding("default", "plain"));
        let registry = HandlerRegistry::new(router("I think research"), default);

        assert!(matches!(
            registry.handle("task").await,
            Err(HandlerError::UnknownHandlerKind(_))
        ));
    }
}
