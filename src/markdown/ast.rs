//! Portable markdown AST
//!
//! A closed set of block and inline nodes modelled after mdast. The first
//! group of variants is what the rich-text surface understands; the rest
//! are produced by the GFM grammar and survive a markdown round trip, but
//! are dropped when the tree is handed to the rich-text model.

use serde::{Deserialize, Serialize};

/// Root of a parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "root")]
pub struct Root {
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Root {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Concatenated text of every leaf in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.collect_text(&mut out);
        }
        out
    }
}

/// Table column alignment (GFM).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableAlignment {
    #[default]
    None,
    Left,
    Center,
    Right,
}

/// A node in the markdown AST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    // Block content
    Heading {
        depth: u8,
        #[serde(default)]
        children: Vec<Node>,
    },
    Paragraph {
        #[serde(default)]
        children: Vec<Node>,
    },
    List {
        ordered: bool,
        #[serde(default)]
        children: Vec<Node>,
    },
    ListItem {
        #[serde(default)]
        children: Vec<Node>,
    },
    Code {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
        value: String,
    },
    Blockquote {
        #[serde(default)]
        children: Vec<Node>,
    },
    ThematicBreak,

    // Inline content
    Text {
        value: String,
    },
    Strong {
        #[serde(default)]
        children: Vec<Node>,
    },
    Emphasis {
        #[serde(default)]
        children: Vec<Node>,
    },
    InlineCode {
        value: String,
    },
    Link {
        url: String,
        #[serde(default)]
        children: Vec<Node>,
    },

    // Grammar extensions the rich-text surface does not model
    Delete {
        #[serde(default)]
        children: Vec<Node>,
    },
    Break,
    Html {
        value: String,
    },
    Image {
        url: String,
        #[serde(default)]
        alt: String,
    },
    Table {
        #[serde(default)]
        align: Vec<TableAlignment>,
        #[serde(default)]
        children: Vec<Node>,
    },
    TableRow {
        #[serde(default)]
        children: Vec<Node>,
    },
    TableCell {
        #[serde(default)]
        children: Vec<Node>,
    },
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text {
            value: value.into(),
        }
    }

    pub fn paragraph(children: Vec<Node>) -> Self {
        Node::Paragraph { children }
    }

    pub fn heading(depth: u8, children: Vec<Node>) -> Self {
        Node::Heading { depth, children }
    }

    /// Child nodes, or an empty slice for leaves.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Heading { children, .. }
            | Node::Paragraph { children }
            | Node::List { children, .. }
            | Node::ListItem { children }
            | Node::Blockquote { children }
            | Node::Strong { children }
            | Node::Emphasis { children }
            | Node::Link { children, .. }
            | Node::Delete { children }
            | Node::Table { children, .. }
            | Node::TableRow { children }
            | Node::TableCell { children } => children,
            Node::Code { .. }
            | Node::ThematicBreak
            | Node::Text { .. }
            | Node::InlineCode { .. }
            | Node::Break
            | Node::Html { .. }
            | Node::Image { .. } => &[],
        }
    }

    /// Get all text content from this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, output: &mut String) {
        match self {
            Node::Text { value } | Node::InlineCode { value } => output.push_str(value),
            Node::Code { value, .. } => output.push_str(value),
            Node::Break => output.push('\n'),
            _ => {}
        }
        for child in self.children() {
            child.collect_text(output);
        }
    }
}
