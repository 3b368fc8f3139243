//! Web search through the Serper API

use crate::handlers::HandlerError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Default Serper endpoint
pub const SERPER_URL: &str = "https://google.serper.dev/search";

/// One organic search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Web search backend used by the research pipeline
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchHit>, HandlerError>;
}

pub struct SerperSearch {
    client: reqwest::Client,
    api_key: String,
    url: String,
    max_results: usize,
}

impl SerperSearch {
    pub fn new(
        api_key: impl Into<String>,
        url: impl Into<String>,
        max_results: usize,
    ) -> Result<Self, HandlerError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(HandlerError::Search(
                "Search API key is required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| HandlerError::Search(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            url: url.into(),
            max_results,
        })
    }
}

#[async_trait]
impl WebSearch for SerperSearch {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchHit>, HandlerError> {
        let num_results = num_results.min(self.max_results);
        let payload = build_search_payload(query, num_results);

        let response = self
            .client
            .post(&self.url)
            .header("X-API-KEY", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| HandlerError::Search(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(HandlerError::Search(format!(
                "Serper API error ({}): {}",
                status.as_u16(),
                error_text
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| HandlerError::Search(format!("Failed to parse response: {e}")))?;

        Ok(parse_search_response(&body, num_results))
    }
}

/// Build the Serper request body (pure function)
pub fn build_search_payload(query: &str, num_results: usize) -> Value {
    json!({
        "q": query,
        "num": num_results,
        "gl": "us",
        "hl": "en"
    })
}

/// Extract organic results that carry both a title and a link (pure function)
pub fn parse_search_response(body: &Value, num_results: usize) -> Vec<SearchHit> {
    body.get("organic")
        .and_then(Value::as_array)
        .map(|organic| {
            organic
                .iter()
                .filter_map(|result| {
                    Some(SearchHit {
                        title: result.get("title")?.as_str()?.to_string(),
                        url: result.get("link")?.as_str()?.to_string(),
                        snippet: result
                            .get("snippet")
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                    })
                })
                .take(num_results)
                .collect()
        })
        .unwrap_or_default()
}

/// Render hits as a numbered list for prompts and the thought trace
pub fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results".to_string();
    }
    hits.iter()
        .enumerate()
        .map(|(i, hit)| format!("{}. {} ({})\n   {}", i + 1, hit.title, hit.url, hit.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}
