//! Page, block and status types read from the task database

use crate::notion::blocks::rich_text_to_string;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Task lifecycle states driven by the database's Status property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Execute,
    Iterate,
    InProgress,
    Review,
    Error,
}

impl PageStatus {
    /// Statuses the poller picks work from
    pub fn is_actionable(&self) -> bool {
        matches!(self, PageStatus::Execute | PageStatus::Iterate)
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageStatus::Execute => "execute",
            PageStatus::Iterate => "iterate",
            PageStatus::InProgress => "in_progress",
            PageStatus::Review => "review",
            PageStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// A database row as returned by a query
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub properties: Value,
    #[serde(default)]
    pub last_edited_time: Option<DateTime<Utc>>,
}

impl Page {
    /// Build a page with only a title property, mostly for tests and mocks
    pub fn with_title(
        id: impl Into<String>,
        title_property: &str,
        title: impl Into<String>,
    ) -> Self {
        let title = title.into();
        Self {
            id: id.into(),
            properties: json!({
                title_property: {
                    "type": "title",
                    "title": [{
                        "type": "text",
                        "text": { "content": title },
                        "plain_text": title,
                    }]
                }
            }),
            last_edited_time: None,
        }
    }

    /// Plain-text title stored under `property`, `None` when missing or blank
    pub fn title(&self, property: &str) -> Option<String> {
        let title = rich_text_to_string(self.properties.get(property)?.get("title")?);
        let trimmed = title.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Current status name stored under `property`
    pub fn status_name(&self, property: &str) -> Option<&str> {
        self.properties
            .get(property)?
            .get("status")?
            .get("name")?
            .as_str()
    }
}

/// Direct child of a page, as listed by `GET /blocks/{id}/children`
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRef {
    pub id: String,
    pub block_type: String,
    /// Concatenated rich text of the block, empty for dividers and media
    pub text: String,
}

impl BlockRef {
    /// Extract a block reference from a raw Notion block object
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = value.get("id")?.as_str()?.to_string();
        let block_type = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unsupported")
            .to_string();
        let text = value
            .get(&block_type)
            .and_then(|payload| payload.get("rich_text"))
            .map(rich_text_to_string)
            .unwrap_or_default();

        Some(Self {
            id,
            block_type,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_title_extraction() {
        let page = Page::with_title("page-1", "Task", "Research rust async runtimes");
        assert_eq!(
            page.title("Task"),
            Some("Research rust async runtimes".to_string())
        );
        assert_eq!(page.title("Name"), None);
    }

    #[test]
    fn test_page_title_from_query_payload() {
        let page: Page = serde_json::from_value(json!({
            "object": "page",
            "id": "abc",
            "last_edited_time": "2024-01-01T00:00:00.000Z",
            "properties": {
                "Status": { "type": "status", "status": { "name": "Execute" } },
                "Task": {
                    "type": "title",
                    "title": [
                        { "type": "text", "text": { "content": "Summarize " }, "plain_text": "Summarize " },
                        { "type": "text", "text": { "content": "the report" }, "plain_text": "the report" }
                    ]
                }
            }
        }))
        .unwrap();

        assert_eq!(page.id, "abc");
        assert_eq!(page.title("Task"), Some("Summarize the report".to_string()));
        assert_eq!(page.status_name("Status"), Some("Execute"));
        assert_eq!(
            page.last_edited_time.map(|t| t.to_rfc3339()),
            Some("2024-01-01T00:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_blank_title_is_none() {
        let page = Page::with_title("page-1", "Task", "   ");
        assert_eq!(page.title("Task"), None);
    }

    #[test]
    fn test_block_ref_from_value() {
        let block = BlockRef::from_value(&json!({
            "object": "block",
            "id": "block-1",
            "type": "paragraph",
            "paragraph": {
                "rich_text": [{ "type": "text", "text": { "content": "Some text" } }]
            }
        }))
        .unwrap();

        assert_eq!(block.id, "block-1");
        assert_eq!(block.block_type, "paragraph");
        assert_eq!(block.text, "Some text");

        let divider = BlockRef::from_value(&json!({
            "id": "block-2",
            "type": "divider",
            "divider": {}
        }))
        .unwrap();
        assert_eq!(divider.text, "");

        assert!(BlockRef::from_value(&json!({ "type": "divider" })).is_none());
    }

    #[test]
    fn test_actionable_statuses() {
        assert!(PageStatus::Execute.is_actionable());
        assert!(PageStatus::Iterate.is_actionable());
        assert!(!PageStatus::InProgress.is_actionable());
        assert!(!PageStatus::Review.is_actionable());
        assert!(!PageStatus::Error.is_actionable());
    }
}
