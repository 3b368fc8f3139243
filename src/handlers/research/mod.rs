//! Two-step research pipeline
//!
//! The researcher step plans web searches, runs them and condenses the hits
//! into [`InitialResearchOutput`]. The senior researcher step turns those
//! findings into a [`SynthesisOutput`]. Every step is recorded in the
//! invocation's thought trace.

use crate::handlers::thought::{StepEvent, ThoughtAccumulator};
use crate::handlers::{HandlerError, HandlerOutput, TaskHandler};
use crate::llm::{LlmProvider, Message, ModelSettings};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod schema;
pub mod search;

pub use schema::{InitialResearchOutput, QueryPlan, ResearchOutput, SynthesisOutput};
pub use search::{SearchHit, SerperSearch, WebSearch};

const PLANNER_PROMPT: &str = "You are a research planner. Given a research topic, write focused web search queries that together cover the topic. Respond with JSON only.";

const RESEARCHER_PROMPT: &str = "You are a meticulous researcher. Using only the search results provided, extract key facts, recent developments, expert opinions and statistics about the topic. Attribute opinions and statistics to their sources and list every source you relied on. Respond with JSON only.";

const SENIOR_PROMPT: &str = "You are a senior research analyst. Analyze the research findings you are given, identify the most important findings and trends, and make actionable recommendations. Respond with JSON only.";

/// Limits for one pipeline run
#[derive(Debug, Clone, Copy)]
pub struct ResearchLimits {
    pub max_queries: usize,
    pub max_results: usize,
}

impl Default for ResearchLimits {
    fn default() -> Self {
        Self {
            max_queries: 3,
            max_results: 5,
        }
    }
}

pub struct ResearchPipeline {
    llm: Arc<dyn LlmProvider>,
    search: Arc<dyn WebSearch>,
    settings: ModelSettings,
    limits: ResearchLimits,
}

impl ResearchPipeline {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        search: Arc<dyn WebSearch>,
        settings: ModelSettings,
        limits: ResearchLimits,
    ) -> Self {
        Self {
            llm,
            search,
            settings,
            limits,
        }
    }

    async fn plan_queries(
        &self,
        topic: &str,
        thoughts: &mut ThoughtAccumulator,
    ) -> Result<Vec<String>, HandlerError> {
        let request = self
            .settings
            .request(vec![
                Message::system(PLANNER_PROMPT),
                Message::user(format!(
                    "Topic: {topic}\n\nWrite at most {} search queries.",
                    self.limits.max_queries
                )),
            ])
            .with_response_format(schema::response_format::<QueryPlan>("query_plan"));

        let content = self.llm.complete(request).await?.text()?;
        let plan: QueryPlan = schema::parse_structured(&content)?;

        let queries: Vec<String> = plan
            .queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .take(self.limits.max_queries)
            .collect();

        // A plan without queries still searches the topic itself
        let queries = if queries.is_empty() {
            vec![topic.to_string()]
        } else {
            queries
        };

        thoughts.record(StepEvent::Content(format!(
            "Planned searches:\n- {}",
            queries.join("\n- ")
        )));
        Ok(queries)
    }

    async fn run_searches(
        &self,
        queries: &[String],
        thoughts: &mut ThoughtAccumulator,
    ) -> Result<Vec<(String, Vec<SearchHit>)>, HandlerError> {
        let mut results = Vec::new();
        let mut last_error = None;

        for query in queries {
            thoughts.record(StepEvent::Raw(format!("web_search: {query}")));
            match self.search.search(query, self.limits.max_results).await {
                Ok(hits) => {
                    debug!(query = %query, hits = hits.len(), "Search completed");
                    thoughts.record(StepEvent::ToolResult(search::format_hits(&hits)));
                    results.push((query.clone(), hits));
                }
                Err(e) => {
                    warn!(query = %query, error = %e, "Search failed");
                    thoughts.record(StepEvent::ToolResult(format!("Search failed: {e}")));
                    last_error = Some(e);
                }
            }
        }

        match (results.is_empty(), last_error) {
            (true, Some(e)) => Err(e),
            _ => Ok(results),
        }
    }

    async fn research(
        &self,
        topic: &str,
        results: &[(String, Vec<SearchHit>)],
        thoughts: &mut ThoughtAccumulator,
    ) -> Result<InitialResearchOutput, HandlerError> {
        let mut context = format!("Topic: {topic}\n\nSearch results:\n");
        for (query, hits) in results {
            context.push_str(&format!("\nQuery: {query}\n{}\n", search::format_hits(hits)));
        }

        let request = self
            .settings
            .request(vec![Message::system(RESEARCHER_PROMPT), Message::user(context)])
            .with_response_format(schema::response_format::<InitialResearchOutput>(
                "initial_research",
            ));

        let content = self.llm.complete(request).await?.text()?;
        let findings: InitialResearchOutput = schema::parse_structured(&content)?;
        thoughts.record(StepEvent::Output(to_pretty_json(&findings)));
        Ok(findings)
    }

    async fn synthesize(
        &self,
        topic: &str,
        findings: &InitialResearchOutput,
        thoughts: &mut ThoughtAccumulator,
    ) -> Result<SynthesisOutput, HandlerError> {
        let request = self
            .settings
            .request(vec![
                Message::system(SENIOR_PROMPT),
                Message::user(format!(
                    "Topic: {topic}\n\nResearch findings:\n{}",
                    to_pretty_json(findings)
                )),
            ])
            .with_response_format(schema::response_format::<SynthesisOutput>(
                "research_synthesis",
            ));

        let content = self.llm.complete(request).await?.text()?;
        let synthesis: SynthesisOutput = schema::parse_structured(&content)?;
        thoughts.record(StepEvent::Output(to_pretty_json(&synthesis)));
        Ok(synthesis)
    }
}

#[async_trait]
impl TaskHandler for ResearchPipeline {
    fn name(&self) -> &str {
        "research"
    }

    async fn handle(&self, task: &str) -> Result<HandlerOutput, HandlerError> {
        let mut thoughts = ThoughtAccumulator::new();

        let queries = self.plan_queries(task, &mut thoughts).await?;
        let results = self.run_searches(&queries, &mut thoughts).await?;
        let findings = self.research(task, &results, &mut thoughts).await?;
        let synthesis = self.synthesize(task, &findings, &mut thoughts).await?;

        let report = ResearchOutput::new(findings, synthesis);
        info!(
            queries = queries.len(),
            sources = report.initial_research.sources.len(),
            steps = thoughts.len(),
            "Research completed"
        );

        let output = HandlerOutput::new(report.render());
        Ok(match thoughts.finish() {
            Some(trace) => output.with_thoughts(trace),
            None => output,
        })
    }
}

fn to_pretty_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}
