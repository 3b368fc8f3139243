//! Notion REST API client
//!
//! Implements [`DocumentStore`] over `reqwest`. Calls are not retried here;
//! the poll loop picks failed pages up again on the next cycle.

use crate::notion::blocks::rich_text_to_string;
use crate::notion::model::{BlockRef, Page};
use crate::notion::{ContentBlock, DocumentStore, StoreError};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const PAGE_SIZE: &str = "100";
const SUMMARY_LIMIT: usize = 2000;

/// Notion client configuration
#[derive(Debug, Clone)]
pub struct NotionClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub notion_version: String,
    pub database_id: String,
    pub status_property: String,
    pub response_property: String,
    pub timeout: Duration,
}

impl Default for NotionClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.notion.com/v1".to_string(),
            notion_version: "2022-06-28".to_string(),
            database_id: String::new(),
            status_property: "Status".to_string(),
            response_property: "Response".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Notion API client
pub struct NotionClient {
    config: NotionClientConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl NotionClient {
    /// Create a new client
    pub fn new(config: NotionClientConfig) -> Result<Self, StoreError> {
        if config.api_key.is_empty() {
            return Err(StoreError::Config(
                "Notion API key is required".to_string(),
            ));
        }
        if config.database_id.is_empty() {
            return Err(StoreError::Config(
                "Notion database id is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &NotionClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> Result<Url, StoreError> {
        let base = self.config.base_url.trim_end_matches('/');
        Url::parse(&format!("{base}/{path}"))
            .map_err(|e| StoreError::Config(format!("Invalid Notion URL: {e}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.config.api_key)
            .header("Notion-Version", &self.config.notion_version)
    }

    /// Build the database query body (pure function)
    fn build_query_body(status_property: &str, status: &str, cursor: Option<&str>) -> Value {
        let mut body = json!({
            "filter": {
                "property": status_property,
                "status": { "equals": status }
            },
            "page_size": 100
        });
        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }
        body
    }

    /// Build the property update body (pure function)
    fn build_status_body(
        status_property: &str,
        response_property: &str,
        status: &str,
        summary: Option<&str>,
    ) -> Value {
        let mut properties = serde_json::Map::new();
        properties.insert(
            status_property.to_string(),
            json!({ "status": { "name": status } }),
        );

        if let Some(summary) = summary.filter(|s| !s.is_empty()) {
            let truncated: String = summary.chars().take(SUMMARY_LIMIT).collect();
            properties.insert(
                response_property.to_string(),
                json!({ "rich_text": [{ "text": { "content": truncated } }] }),
            );
        }

        json!({ "properties": properties })
    }

    /// Map an unsuccessful response to a store error
    async fn error_from_response(response: Response) -> StoreError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        Self::classify_error(status, &text)
    }

    /// Classify an error body (pure function)
    fn classify_error(status: u16, body: &str) -> StoreError {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(error) if error.code == "validation_error" => StoreError::Validation(error.message),
            Ok(error) => StoreError::Api {
                status,
                code: error.code,
                message: error.message,
            },
            Err(_) => StoreError::Api {
                status,
                code: "unknown".to_string(),
                message: body.to_string(),
            },
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, StoreError> {
        let response = builder.send().await.map_err(|e| {
            StoreError::Transport(format!(
                "HTTP request failed: {} (is_connect: {}, is_timeout: {})",
                e,
                e.is_connect(),
                e.is_timeout()
            ))
        })?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let error = Self::error_from_response(response).await;
            warn!(error = %error, "Notion request rejected");
            Err(error)
        }
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, StoreError> {
        self.send(builder)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))
    }

    /// Follow `next_cursor` through a paginated GET listing
    async fn list_all(&self, mut url: Url) -> Result<Vec<Value>, StoreError> {
        url.query_pairs_mut().append_pair("page_size", PAGE_SIZE);
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut page_url = url.clone();
            if let Some(cursor) = &cursor {
                page_url.query_pairs_mut().append_pair("start_cursor", cursor);
            }

            let page: ListResponse = self
                .send_json(self.request(Method::GET, page_url))
                .await?;
            results.extend(page.results);

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(results)
    }
}

#[async_trait]
impl DocumentStore for NotionClient {
    async fn query_pages(&self, status: &str) -> Result<Vec<Page>, StoreError> {
        let url = self.url(&format!("databases/{}/query", self.config.database_id))?;
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let body =
                Self::build_query_body(&self.config.status_property, status, cursor.as_deref());
            let response: ListResponse = self
                .send_json(self.request(Method::POST, url.clone()).json(&body))
                .await?;

            for raw in response.results {
                let page: Page = serde_json::from_value(raw)
                    .map_err(|e| StoreError::InvalidResponse(format!("Malformed page: {e}")))?;
                pages.push(page);
            }

            match (response.has_more, response.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        debug!(status = %status, count = pages.len(), "Queried pages");
        Ok(pages)
    }

    async fn get_children(&self, block_id: &str) -> Result<Vec<BlockRef>, StoreError> {
        let url = self.url(&format!("blocks/{block_id}/children"))?;
        let raw = self.list_all(url).await?;
        Ok(raw.iter().filter_map(BlockRef::from_value).collect())
    }

    async fn delete_block(&self, block_id: &str) -> Result<(), StoreError> {
        let url = self.url(&format!("blocks/{block_id}"))?;
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    async fn append_blocks(
        &self,
        block_id: &str,
        blocks: &[ContentBlock],
    ) -> Result<(), StoreError> {
        let url = self.url(&format!("blocks/{block_id}/children"))?;
        let children: Vec<Value> = blocks.iter().map(ContentBlock::to_wire).collect();
        debug!(block_id = %block_id, blocks = children.len(), "Appending blocks");

        self.send(
            self.request(Method::PATCH, url)
                .json(&json!({ "children": children })),
        )
        .await?;
        Ok(())
    }

    async fn update_status(
        &self,
        page_id: &str,
        status: &str,
        summary: Option<&str>,
    ) -> Result<(), StoreError> {
        let url = self.url(&format!("pages/{page_id}"))?;
        let body = Self::build_status_body(
            &self.config.status_property,
            &self.config.response_property,
            status,
            summary,
        );

        self.send(self.request(Method::PATCH, url).json(&body))
            .await?;
        Ok(())
    }

    async fn list_comments(&self, block_id: &str) -> Result<Vec<String>, StoreError> {
        let mut url = self.url("comments")?;
        url.query_pairs_mut().append_pair("block_id", block_id);
        let raw = self.list_all(url).await?;

        Ok(raw
            .iter()
            .filter_map(|comment| comment.get("rich_text"))
            .map(rich_text_to_string)
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let url = self.url(&format!("databases/{}", self.config.database_id))?;
        self.send(self.request(Method::GET, url)).await?;
        Ok(())
    }
}
