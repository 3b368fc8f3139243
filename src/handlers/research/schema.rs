//! Structured outputs of the research pipeline steps
//!
//! Each step asks the model for JSON matching one of these types. Responses
//! are checked against the generated schema before deserialization.

use crate::handlers::HandlerError;
use crate::llm::{JsonSchemaDefinition, ResponseFormat};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Search queries planned for a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueryPlan {
    /// Web search queries, most important first
    pub queries: Vec<String>,
}

/// Findings of the researcher step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InitialResearchOutput {
    /// Key facts and data points discovered
    pub key_facts: Vec<String>,
    /// Recent developments in the topic
    pub recent_developments: Vec<String>,
    /// Expert opinions with source attribution
    pub expert_opinions: Vec<BTreeMap<String, String>>,
    /// Relevant statistics with source attribution
    pub statistics: Vec<BTreeMap<String, String>>,
    /// Sources consulted
    pub sources: Vec<String>,
}

/// Analysis produced by the senior researcher step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SynthesisOutput {
    /// Brief overview of the entire analysis
    pub executive_summary: String,
    /// Key findings from the analysis
    pub key_findings: Vec<String>,
    /// Identified trends and their analysis
    pub trend_analysis: BTreeMap<String, String>,
    /// Actionable recommendations based on the research
    pub recommendations: Vec<String>,
}

/// Final report: the synthesis together with the raw findings it was built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchOutput {
    pub executive_summary: String,
    pub initial_research: InitialResearchOutput,
    pub key_findings: Vec<String>,
    pub trend_analysis: BTreeMap<String, String>,
    pub recommendations: Vec<String>,
}

impl ResearchOutput {
    pub fn new(initial_research: InitialResearchOutput, synthesis: SynthesisOutput) -> Self {
        Self {
            executive_summary: synthesis.executive_summary,
            initial_research,
            key_findings: synthesis.key_findings,
            trend_analysis: synthesis.trend_analysis,
            recommendations: synthesis.recommendations,
        }
    }

    /// Plain-text report written to the page
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Executive Summary\n{}", self.executive_summary.trim());

        push_list(&mut out, "Key Findings", &self.key_findings);

        if !self.trend_analysis.is_empty() {
            let _ = write!(out, "\nTrend Analysis\n");
            for (trend, analysis) in &self.trend_analysis {
                let _ = writeln!(out, "- {trend}: {analysis}");
            }
        }

        push_list(&mut out, "Recommendations", &self.recommendations);
        push_list(&mut out, "Sources", &self.initial_research.sources);
        out.trim_end().to_string()
    }
}

fn push_list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = write!(out, "\n{title}\n");
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
}

/// JSON schema of `T` as a value
pub fn schema_value<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default()
}

/// Structured output request format for `T`
pub fn response_format<T: JsonSchema>(name: &str) -> ResponseFormat {
    ResponseFormat::JsonSchema {
        json_schema: JsonSchemaDefinition {
            name: name.to_string(),
            strict: Some(false),
            schema: schema_value::<T>(),
        },
    }
}

/// Validate model output against the schema of `T`, then deserialize it
pub fn parse_structured<T>(content: &str) -> Result<T, HandlerError>
where
    T: DeserializeOwned + JsonSchema,
{
    let value: Value = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| HandlerError::Pipeline(format!("Model output is not JSON: {e}")))?;

    let schema = schema_value::<T>();
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| HandlerError::Pipeline(format!("Schema compilation error: {e}")))?;

    validator.validate(&value).map_err(|errors| {
        let messages: Vec<String> = errors
            .map(|e| format!("At '{}': {}", e.instance_path, e))
            .collect();
        HandlerError::Pipeline(format!("Model output failed validation: {}", messages.join("; ")))
    })?;

    serde_json::from_value(value)
        .map_err(|e| HandlerError::Pipeline(format!("Model output has wrong shape: {e}")))
}

/// Models sometimes wrap JSON in a fenced code block
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}
