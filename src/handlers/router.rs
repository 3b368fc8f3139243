//! Task routing with a single model call
//!
//! The router model answers with `<handler key>: <reasoning>`; the key is
//! parsed into a [`HandlerKind`].

use crate::handlers::{HandlerError, HandlerKind};
use crate::llm::{LlmProvider, Message, ModelSettings};
use std::sync::Arc;
use tracing::{debug, info};

const ROUTER_INTRO: &str =
    "You are a task router that determines which specialized handler should process a given task.";

/// System prompt offering exactly `kinds`
pub fn router_prompt(kinds: &[HandlerKind]) -> String {
    let mut prompt = format!("{ROUTER_INTRO}\nAvailable handlers:\n");
    for kind in kinds {
        prompt.push_str(&format!("- {}: {}\n", kind.as_str(), kind.description()));
    }
    prompt.push_str(
        "\nRespond with ONLY the handler name followed by a colon and a brief explanation, like this:\n",
    );
    let examples: Vec<String> = kinds
        .iter()
        .map(|kind| format!("{}: {}", kind.as_str(), example_reasoning(*kind)))
        .collect();
    prompt.push_str(&examples.join("\nOR\n"));
    prompt
}

fn example_reasoning(kind: HandlerKind) -> &'static str {
    match kind {
        HandlerKind::Research => "This task requires gathering information from multiple sources",
        HandlerKind::Default => "This is a general task that doesn't require specialized handling",
    }
}

/// Routing decision for one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub kind: HandlerKind,
    pub reasoning: String,
}

pub struct TaskRouter {
    llm: Arc<dyn LlmProvider>,
    settings: ModelSettings,
}

impl TaskRouter {
    pub fn new(llm: Arc<dyn LlmProvider>, settings: ModelSettings) -> Self {
        Self { llm, settings }
    }

    /// Ask the model which of `kinds` should process `task`
    ///
    /// An answer outside the offered kinds still parses if it names a known
    /// kind; the caller decides what an unavailable kind means.
    pub async fn route(
        &self,
        task: &str,
        kinds: &[HandlerKind],
    ) -> Result<RouteDecision, HandlerError> {
        let request = self.settings.request(vec![
            Message::system(router_prompt(kinds)),
            Message::user(format!("Task: {task}")),
        ]);

        let answer = self.llm.complete(request).await?.text()?;
        debug!(answer = %answer, "Router answered");

        let decision = parse_route(&answer)?;
        info!(kind = %decision.kind, reasoning = %decision.reasoning, "Task routed");
        Ok(decision)
    }
}

/// Parse `<key>: <reasoning>`, splitting on the first colon
pub fn parse_route(answer: &str) -> Result<RouteDecision, HandlerError> {
    let (key, reasoning) = answer
        .split_once(':')
        .ok_or_else(|| HandlerError::UnknownHandlerKind(answer.trim().to_string()))?;

    Ok(RouteDecision {
        kind: key.parse()?,
        reasoning: reasoning.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::MockLlmProvider;

    #[test]
    fn test_parse_research_route() {
        let decision = parse_route("research_crew: needs sources").unwrap();
        assert_eq!(decision.kind, HandlerKind::Research);
        assert_eq!(decision.reasoning, "needs sources");
    }

    #[test]
    fn test_parse_splits_on_first_colon_only() {
        let decision = parse_route("Default: answer format: short").unwrap();
        assert_eq!(decision.kind, HandlerKind::Default);
        assert_eq!(decision.reasoning, "answer format: short");
    }

    #[test]
    fn test_parse_unknown_key() {
        assert!(matches!(
            parse_route("writer_crew: prose"),
            Err(HandlerError::UnknownHandlerKind(kind)) if kind == "writer_crew"
        ));
    }

    #[test]
    fn test_parse_missing_colon() {
        assert!(matches!(
            parse_route("research_crew"),
            Err(HandlerError::UnknownHandlerKind(_))
        ));
    }

    #[tokio::test]
    async fn test_route_sends_task_to_model() {
        let llm = Arc::new(MockLlmProvider::single_response(
            "research_crew: compare vendors",
        ));
        let router = TaskRouter::new(llm.clone(), ModelSettings::new("gpt-4o-mini"));

        let decision = router
            .route(
                "Compare vector databases",
                &[HandlerKind::Research, HandlerKind::Default],
            )
            .await
            .unwrap();
        assert_eq!(decision.kind, HandlerKind::Research);

        let requests = llm.get_requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages[1].content, "Task: Compare vector databases");
        assert!(requests[0].messages[0].content.contains("research_crew"));
    }

    #[test]
    fn test_prompt_offers_only_given_kinds() {
        let prompt = router_prompt(&[HandlerKind::Default]);
        assert!(prompt.contains("- default: For general tasks"));
        assert!(prompt.contains("default: This is a general task"));
        assert!(!prompt.contains("research_crew"));
        assert!(!prompt.contains("\nOR\n"));

        let both = router_prompt(&[HandlerKind::Research, HandlerKind::Default]);
        assert!(both.contains("- research_crew: For tasks requiring web research"));
        assert!(both.contains("\nOR\n"));
    }

    #[tokio::test]
    async fn test_route_propagates_llm_failure() {
        let router = TaskRouter::new(
            Arc::new(MockLlmProvider::with_failure()),
            ModelSettings::new("gpt-4o-mini"),
        );
        assert!(matches!(
            router.route("anything", &[HandlerKind::Default]).await,
            Err(HandlerError::Llm(_))
        ));
    }
}
