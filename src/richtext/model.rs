//! Structured document model consumed by the rich-text surface
//!
//! The JSON shape follows the block/inline contract used by ProseMirror-style
//! editors: every node carries a `type`, blocks carry `attrs` and `content`,
//! and text runs carry `text` plus an ordered list of `marks`.
//!
//! Deserialization is total. Node or mark types outside the recognized set
//! become [`StructuredNode::Unsupported`] / [`Mark::Unsupported`], which the
//! transformer drops.

use serde::{Deserialize, Serialize};

/// Root of a structured document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "doc")]
pub struct StructuredDoc {
    #[serde(default)]
    pub content: Vec<StructuredNode>,
}

impl StructuredDoc {
    pub fn new(content: Vec<StructuredNode>) -> Self {
        Self { content }
    }

    /// Parse a document from its JSON form.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Concatenated text of every run in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for node in &self.content {
            node.collect_text(&mut out);
        }
        out
    }
}

/// Attributes of a heading block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingAttrs {
    pub level: u8,
}

impl Default for HeadingAttrs {
    fn default() -> Self {
        Self { level: 1 }
    }
}

/// Attributes of a code block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlockAttrs {
    #[serde(default)]
    pub language: Option<String>,
}

/// Attributes of a link mark.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkAttrs {
    #[serde(default)]
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Inline formatting applied to a text run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Mark {
    Bold,
    Italic,
    Code,
    Link {
        #[serde(default)]
        attrs: LinkAttrs,
    },
    #[serde(other)]
    Unsupported,
}

impl Mark {
    /// A link mark that opens in a new browsing context.
    pub fn link(href: impl Into<String>) -> Self {
        Mark::Link {
            attrs: LinkAttrs {
                href: href.into(),
                target: Some("_blank".to_string()),
            },
        }
    }
}

/// A block or inline node of the structured document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StructuredNode {
    Heading {
        #[serde(default)]
        attrs: HeadingAttrs,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<StructuredNode>,
    },
    Paragraph {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<StructuredNode>,
    },
    BulletList {
        #[serde(default)]
        content: Vec<StructuredNode>,
    },
    OrderedList {
        #[serde(default)]
        content: Vec<StructuredNode>,
    },
    ListItem {
        #[serde(default)]
        content: Vec<StructuredNode>,
    },
    CodeBlock {
        #[serde(default)]
        attrs: CodeBlockAttrs,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<StructuredNode>,
    },
    Blockquote {
        #[serde(default)]
        content: Vec<StructuredNode>,
    },
    HorizontalRule,
    Text {
        #[serde(default)]
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        marks: Vec<Mark>,
    },
    #[serde(other)]
    Unsupported,
}

impl StructuredNode {
    pub fn text(text: impl Into<String>) -> Self {
        StructuredNode::Text {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    pub fn marked_text(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        StructuredNode::Text {
            text: text.into(),
            marks,
        }
    }

    pub fn paragraph(content: Vec<StructuredNode>) -> Self {
        StructuredNode::Paragraph { content }
    }

    pub fn heading(level: u8, content: Vec<StructuredNode>) -> Self {
        StructuredNode::Heading {
            attrs: HeadingAttrs { level },
            content,
        }
    }

    /// Child nodes, or an empty slice for leaves.
    pub fn content(&self) -> &[StructuredNode] {
        match self {
            StructuredNode::Heading { content, .. }
            | StructuredNode::Paragraph { content }
            | StructuredNode::BulletList { content }
            | StructuredNode::OrderedList { content }
            | StructuredNode::ListItem { content }
            | StructuredNode::CodeBlock { content, .. }
            | StructuredNode::Blockquote { content } => content,
            StructuredNode::HorizontalRule
            | StructuredNode::Text { .. }
            | StructuredNode::Unsupported => &[],
        }
    }

    fn collect_text(&self, output: &mut String) {
        if let StructuredNode::Text { text, .. } = self {
            output.push_str(text);
        }
        for child in self.content() {
            child.collect_text(output);
        }
    }
}
