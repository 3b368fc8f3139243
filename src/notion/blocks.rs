//! Typed content blocks and their Notion wire representation
//!
//! Only the four block types this service writes are modelled. Every
//! text-bearing block carries a single rich-text fragment.

use serde_json::{json, Value};

/// Visual style of a callout block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalloutStyle {
    /// Red banner used for processing errors
    Warning,
    /// Neutral banner
    Info,
}

impl CalloutStyle {
    /// Emoji shown as the callout icon
    pub fn emoji(&self) -> &'static str {
        match self {
            CalloutStyle::Warning => "⚠️",
            CalloutStyle::Info => "💡",
        }
    }

    /// Notion background color name
    pub fn color(&self) -> &'static str {
        match self {
            CalloutStyle::Warning => "red_background",
            CalloutStyle::Info => "gray_background",
        }
    }
}

/// A block of page body content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Heading(String),
    Paragraph(String),
    Divider,
    Callout { text: String, style: CalloutStyle },
}

impl ContentBlock {
    pub fn heading(text: impl Into<String>) -> Self {
        Self::Heading(text.into())
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::Paragraph(text.into())
    }

    pub fn callout(text: impl Into<String>, style: CalloutStyle) -> Self {
        Self::Callout {
            text: text.into(),
            style,
        }
    }

    /// Notion block type name
    pub fn block_type(&self) -> &'static str {
        match self {
            ContentBlock::Heading(_) => "heading_2",
            ContentBlock::Paragraph(_) => "paragraph",
            ContentBlock::Divider => "divider",
            ContentBlock::Callout { .. } => "callout",
        }
    }

    /// Text carried by the block, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            ContentBlock::Heading(text) | ContentBlock::Paragraph(text) => Some(text),
            ContentBlock::Callout { text, .. } => Some(text),
            ContentBlock::Divider => None,
        }
    }

    pub fn is_divider(&self) -> bool {
        matches!(self, ContentBlock::Divider)
    }

    /// Serialize to the JSON shape accepted by `PATCH /blocks/{id}/children`
    pub fn to_wire(&self) -> Value {
        let block_type = self.block_type();
        let payload = match self {
            ContentBlock::Heading(text) | ContentBlock::Paragraph(text) => {
                json!({ "rich_text": rich_text(text) })
            }
            ContentBlock::Divider => json!({}),
            ContentBlock::Callout { text, style } => json!({
                "rich_text": rich_text(text),
                "icon": { "emoji": style.emoji() },
                "color": style.color(),
            }),
        };

        json!({
            "object": "block",
            "type": block_type,
            block_type: payload,
        })
    }
}

fn rich_text(content: &str) -> Value {
    json!([{ "type": "text", "text": { "content": content } }])
}

/// Concatenate the text of a Notion rich-text array
///
/// Prefers `text.content` and falls back to `plain_text` for mentions and
/// equations, which carry no `text` object.
pub fn rich_text_to_string(rich_text: &Value) -> String {
    rich_text
        .as_array()
        .map(|fragments| {
            fragments
                .iter()
                .filter_map(|fragment| {
                    fragment
                        .get("text")
                        .and_then(|t| t.get("content"))
                        .or_else(|| fragment.get("plain_text"))
                        .and_then(Value::as_str)
                })
                .collect::<String>()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_wire_shape() {
        let wire = ContentBlock::paragraph("hello").to_wire();

        assert_eq!(wire["object"], "block");
        assert_eq!(wire["type"], "paragraph");
        assert_eq!(wire["paragraph"]["rich_text"][0]["type"], "text");
        assert_eq!(wire["paragraph"]["rich_text"][0]["text"]["content"], "hello");
    }

    #[test]
    fn test_heading_uses_heading_2() {
        let wire = ContentBlock::heading("AI Response").to_wire();

        assert_eq!(wire["type"], "heading_2");
        assert_eq!(
            wire["heading_2"]["rich_text"][0]["text"]["content"],
            "AI Response"
        );
    }

    #[test]
    fn test_divider_has_empty_payload() {
        let wire = ContentBlock::Divider.to_wire();

        assert_eq!(wire["type"], "divider");
        assert_eq!(wire["divider"], json!({}));
    }

    #[test]
    fn test_callout_carries_icon_and_color() {
        let wire = ContentBlock::callout("Error: boom", CalloutStyle::Warning).to_wire();

        assert_eq!(wire["type"], "callout");
        assert_eq!(wire["callout"]["icon"]["emoji"], "⚠️");
        assert_eq!(wire["callout"]["color"], "red_background");
        assert_eq!(
            wire["callout"]["rich_text"][0]["text"]["content"],
            "Error: boom"
        );
    }

    #[test]
    fn test_text_accessor() {
        assert_eq!(ContentBlock::paragraph("a").text(), Some("a"));
        assert_eq!(ContentBlock::Divider.text(), None);
        assert!(ContentBlock::Divider.is_divider());
        assert!(!ContentBlock::heading("h").is_divider());
    }

    #[test]
    fn test_rich_text_to_string_concatenates_fragments() {
        let value = json!([
            { "type": "text", "text": { "content": "Hello, " } },
            { "type": "mention", "plain_text": "@Ada" },
            { "type": "text", "text": { "content": "!" } }
        ]);

        assert_eq!(rich_text_to_string(&value), "Hello, @Ada!");
        assert_eq!(rich_text_to_string(&json!(null)), "");
    }
}
