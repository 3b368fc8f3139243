//! Mock implementations for testing
//!
//! In-memory document store, scripted LLM provider, web search and task
//! handler, so the whole page lifecycle can be exercised without network
//! access.

use crate::handlers::research::{SearchHit, WebSearch};
use crate::handlers::{HandlerError, HandlerOutput, TaskHandler};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
};
use crate::notion::{BlockRef, ContentBlock, DocumentStore, Page, StoreError};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Property names the mock store uses for seeded pages
pub const MOCK_TITLE_PROPERTY: &str = "Task";
pub const MOCK_STATUS_PROPERTY: &str = "Status";

pub type StatusUpdate = (String, String, Option<String>);

/// In-memory [`DocumentStore`] with call recording and failure injection
#[derive(Debug, Default)]
pub struct MockDocumentStore {
    pages: Arc<Mutex<Vec<Page>>>,
    bodies: Arc<Mutex<HashMap<String, Vec<(String, ContentBlock)>>>>,
    comments: Arc<Mutex<HashMap<String, Vec<String>>>>,
    status_updates: Arc<Mutex<Vec<StatusUpdate>>>,
    append_calls: Arc<Mutex<Vec<(String, Vec<ContentBlock>)>>>,
    deleted_blocks: Arc<Mutex<Vec<String>>>,
    next_block_id: AtomicUsize,

    // Failure injection
    reject_dividers: AtomicBool,
    append_failures: Arc<Mutex<VecDeque<StoreError>>>,
    failing_queries: Arc<Mutex<HashSet<String>>>,
    failing_status_updates: Arc<Mutex<HashSet<(String, String)>>>,
    failing_comment_targets: Arc<Mutex<HashSet<String>>>,
    fail_children: AtomicBool,
    fail_ping: AtomicBool,
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a database row with a title and a status
    pub async fn add_page(&self, page_id: &str, title: &str, status: &str) {
        let mut page = Page::with_title(page_id, MOCK_TITLE_PROPERTY, title);
        set_status_property(&mut page, status);
        self.pages.lock().await.push(page);
    }

    /// Add a row whose title property is missing
    pub async fn add_untitled_page(&self, page_id: &str, status: &str) {
        let mut page = Page {
            id: page_id.to_string(),
            properties: json!({}),
            last_edited_time: None,
        };
        set_status_property(&mut page, status);
        self.pages.lock().await.push(page);
    }

    /// Replace a page body directly, returning the generated block ids
    pub async fn seed_body(&self, page_id: &str, blocks: Vec<ContentBlock>) -> Vec<String> {
        let entries: Vec<(String, ContentBlock)> = blocks
            .into_iter()
            .map(|block| (self.new_block_id(), block))
            .collect();
        let ids = entries.iter().map(|(id, _)| id.clone()).collect();
        self.bodies.lock().await.insert(page_id.to_string(), entries);
        ids
    }

    pub async fn add_comment(&self, target_id: &str, text: &str) {
        self.comments
            .lock()
            .await
            .entry(target_id.to_string())
            .or_default()
            .push(text.to_string());
    }

    pub async fn body(&self, page_id: &str) -> Vec<ContentBlock> {
        self.bodies
            .lock()
            .await
            .get(page_id)
            .map(|entries| entries.iter().map(|(_, block)| block.clone()).collect())
            .unwrap_or_default()
    }

    /// Current status name of a page
    pub async fn status_of(&self, page_id: &str) -> Option<String> {
        self.pages
            .lock()
            .await
            .iter()
            .find(|page| page.id == page_id)
            .and_then(|page| page.status_name(MOCK_STATUS_PROPERTY))
            .map(str::to_string)
    }

    pub async fn get_status_updates(&self) -> Vec<StatusUpdate> {
        self.status_updates.lock().await.clone()
    }

    /// Status updates for one page, as `(status, summary)`
    pub async fn status_history(&self, page_id: &str) -> Vec<(String, Option<String>)> {
        self.status_updates
            .lock()
            .await
            .iter()
            .filter(|(id, _, _)| id == page_id)
            .map(|(_, status, summary)| (status.clone(), summary.clone()))
            .collect()
    }

    pub async fn get_append_calls(&self) -> Vec<(String, Vec<ContentBlock>)> {
        self.append_calls.lock().await.clone()
    }

    pub async fn get_deleted_blocks(&self) -> Vec<String> {
        self.deleted_blocks.lock().await.clone()
    }

    /// Reject every append containing a divider with a validation error
    pub fn reject_dividers(&self) {
        self.reject_dividers.store(true, Ordering::SeqCst);
    }

    /// Fail the next append with `error`; queued errors are consumed in order
    pub async fn fail_next_append(&self, error: StoreError) {
        self.append_failures.lock().await.push_back(error);
    }

    pub async fn fail_query(&self, status: &str) {
        self.failing_queries.lock().await.insert(status.to_string());
    }

    pub async fn fail_status_update(&self, page_id: &str, status: &str) {
        self.failing_status_updates
            .lock()
            .await
            .insert((page_id.to_string(), status.to_string()));
    }

    pub async fn fail_comments_for(&self, target_id: &str) {
        self.failing_comment_targets
            .lock()
            .await
            .insert(target_id.to_string());
    }

    pub fn fail_children(&self) {
        self.fail_children.store(true, Ordering::SeqCst);
    }

    pub fn fail_ping(&self) {
        self.fail_ping.store(true, Ordering::SeqCst);
    }

    fn new_block_id(&self) -> String {
        format!("block-{}", self.next_block_id.fetch_add(1, Ordering::SeqCst))
    }
}

fn set_status_property(page: &mut Page, status: &str) {
    if let Some(properties) = page.properties.as_object_mut() {
        properties.insert(
            MOCK_STATUS_PROPERTY.to_string(),
            json!({"type": "status", "status": {"name": status}}),
        );
    }
}

fn transport_failure(what: &str) -> StoreError {
    StoreError::Transport(format!("Mock {what} failure"))
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn query_pages(&self, status: &str) -> Result<Vec<Page>, StoreError> {
        if self.failing_queries.lock().await.contains(status) {
            return Err(transport_failure("query"));
        }

        Ok(self
            .pages
            .lock()
            .await
            .iter()
            .filter(|page| page.status_name(MOCK_STATUS_PROPERTY) == Some(status))
            .cloned()
            .collect())
    }

    async fn get_children(&self, block_id: &str) -> Result<Vec<BlockRef>, StoreError> {
        if self.fail_children.load(Ordering::SeqCst) {
            return Err(transport_failure("children"));
        }

        Ok(self
            .bodies
            .lock()
            .await
            .get(block_id)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(id, block)| BlockRef {
                        id: id.clone(),
                        block_type: block.block_type().to_string(),
                        text: block.text().unwrap_or_default().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_block(&self, block_id: &str) -> Result<(), StoreError> {
        let mut bodies = self.bodies.lock().await;
        let mut found = false;
        for entries in bodies.values_mut() {
            let before = entries.len();
            entries.retain(|(id, _)| id != block_id);
            found |= entries.len() != before;
        }
        if !found {
            return Err(StoreError::Api {
                status: 404,
                code: "object_not_found".to_string(),
                message: format!("Block {block_id} not found"),
            });
        }
        self.deleted_blocks.lock().await.push(block_id.to_string());
        Ok(())
    }

    async fn append_blocks(
        &self,
        block_id: &str,
        blocks: &[ContentBlock],
    ) -> Result<(), StoreError> {
        self.append_calls
            .lock()
            .await
            .push((block_id.to_string(), blocks.to_vec()));

        if let Some(error) = self.append_failures.lock().await.pop_front() {
            return Err(error);
        }
        if self.reject_dividers.load(Ordering::SeqCst) && blocks.iter().any(ContentBlock::is_divider)
        {
            return Err(StoreError::Validation(
                "body.children should be shorter".to_string(),
            ));
        }

        let entries: Vec<(String, ContentBlock)> = blocks
            .iter()
            .map(|block| (self.new_block_id(), block.clone()))
            .collect();
        self.bodies
            .lock()
            .await
            .entry(block_id.to_string())
            .or_default()
            .extend(entries);
        Ok(())
    }

    async fn update_status(
        &self,
        page_id: &str,
        status: &str,
        summary: Option<&str>,
    ) -> Result<(), StoreError> {
        if self
            .failing_status_updates
            .lock()
            .await
            .contains(&(page_id.to_string(), status.to_string()))
        {
            return Err(transport_failure("status update"));
        }

        let mut pages = self.pages.lock().await;
        let page = pages
            .iter_mut()
            .find(|page| page.id == page_id)
            .ok_or_else(|| StoreError::Api {
                status: 404,
                code: "object_not_found".to_string(),
                message: format!("Page {page_id} not found"),
            })?;
        set_status_property(page, status);

        self.status_updates.lock().await.push((
            page_id.to_string(),
            status.to_string(),
            summary.map(str::to_string),
        ));
        Ok(())
    }

    async fn list_comments(&self, block_id: &str) -> Result<Vec<String>, StoreError> {
        if self.failing_comment_targets.lock().await.contains(block_id) {
            return Err(transport_failure("comments"));
        }
        Ok(self
            .comments
            .lock()
            .await
            .get(block_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.fail_ping.load(Ordering::SeqCst) {
            Err(transport_failure("ping"))
        } else {
            Ok(())
        }
    }
}

/// Mock LLM provider returning scripted responses in rotation
#[derive(Debug)]
pub struct MockLlmProvider {
    pub responses: Vec<String>,
    pub current_response: Arc<Mutex<usize>>,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
    pub should_fail: bool,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            current_response: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
        }
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::new(vec![])
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    pub async fn get_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().await.push(request);

        if self.should_fail {
            return Err(LlmError::RequestFailed("Mock LLM failure".to_string()));
        }

        let mut current = self.current_response.lock().await;
        let response_idx = *current % self.responses.len().max(1);
        *current += 1;

        let content = self
            .responses
            .get(response_idx)
            .cloned()
            .unwrap_or_else(|| "Mock response".to_string());

        Ok(CompletionResponse {
            content: Some(content),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            metadata: HashMap::new(),
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.should_fail {
            Err(LlmError::RequestFailed(
                "Mock health check failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Mock web search returning the same hits for every query
#[derive(Debug, Default)]
pub struct MockWebSearch {
    pub hits: Vec<SearchHit>,
    pub queries: Arc<Mutex<Vec<String>>>,
    pub should_fail: bool,
}

impl MockWebSearch {
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            ..Default::default()
        }
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub async fn get_queries(&self) -> Vec<String> {
        self.queries.lock().await.clone()
    }
}

#[async_trait]
impl WebSearch for MockWebSearch {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchHit>, HandlerError> {
        self.queries.lock().await.push(query.to_string());
        if self.should_fail {
            return Err(HandlerError::Search("Mock search failure".to_string()));
        }
        Ok(self.hits.iter().take(num_results).cloned().collect())
    }
}

/// Mock task handler with scripted output
#[derive(Debug)]
pub struct MockHandler {
    name: String,
    output: HandlerOutput,
    failure: Option<String>,
    fail_when_contains: Option<String>,
    delay: Option<Duration>,
    tasks: Arc<Mutex<Vec<String>>>,
}

impl MockHandler {
    pub fn succeeding(name: &str, result: &str) -> Self {
        Self {
            name: name.to_string(),
            output: HandlerOutput::new(result),
            failure: None,
            fail_when_contains: None,
            delay: None,
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(name: &str, message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::succeeding(name, "")
        }
    }

    pub fn with_thoughts(mut self, thoughts: &str) -> Self {
        self.output.thought_process = Some(thoughts.to_string());
        self
    }

    /// Fail only tasks containing `pattern`
    pub fn fail_when_contains(mut self, pattern: &str) -> Self {
        self.fail_when_contains = Some(pattern.to_string());
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn get_tasks(&self) -> Vec<String> {
        self.tasks.lock().await.clone()
    }
}

#[async_trait]
impl TaskHandler for MockHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, task: &str) -> Result<HandlerOutput, HandlerError> {
        self.tasks.lock().await.push(task.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(HandlerError::Pipeline(message.clone()));
        }
        if let Some(pattern) = &self.fail_when_contains {
            if task.contains(pattern.as_str()) {
                return Err(HandlerError::Pipeline(format!("Mock failure on '{pattern}'")));
            }
        }
        Ok(self.output.clone())
    }
}
