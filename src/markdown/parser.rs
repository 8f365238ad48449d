//! Markdown parser implementation using comrak
//!
//! Wraps comrak's CommonMark + GFM parser and lowers its arena tree into the
//! owned [`Root`] AST. Parsing is total: comrak accepts any input, and node
//! kinds the AST does not model are dropped during lowering.

use comrak::{
    nodes::{AstNode, ListType as ComrakListType, NodeValue, TableAlignment as ComrakTableAlignment},
    parse_document, Arena, Options,
};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::markdown::ast::{Node, Root, TableAlignment};

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

/// Grammar extensions layered on top of CommonMark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownOptions {
    /// Enable GitHub Flavored Markdown tables
    pub tables: bool,
    /// Enable strikethrough syntax (~~text~~)
    pub strikethrough: bool,
    /// Enable autolink URLs and emails
    pub autolink: bool,
    /// Enable task lists (- [ ] and - [x])
    pub tasklist: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            tables: true,
            strikethrough: true,
            autolink: true,
            tasklist: true,
        }
    }
}

impl MarkdownOptions {
    /// Plain CommonMark with every extension switched off.
    pub fn commonmark() -> Self {
        Self {
            tables: false,
            strikethrough: false,
            autolink: false,
            tasklist: false,
        }
    }

    /// Convert to comrak Options.
    fn to_comrak_options(&self) -> Options {
        let mut options = Options::default();

        options.extension.strikethrough = self.strikethrough;
        options.extension.table = self.tables;
        options.extension.autolink = self.autolink;
        options.extension.tasklist = self.tasklist;

        options
    }
}

impl From<ComrakTableAlignment> for TableAlignment {
    fn from(align: ComrakTableAlignment) -> Self {
        match align {
            ComrakTableAlignment::None => TableAlignment::None,
            ComrakTableAlignment::Left => TableAlignment::Left,
            ComrakTableAlignment::Center => TableAlignment::Center,
            ComrakTableAlignment::Right => TableAlignment::Right,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Parse markdown text into an AST using the default extensions.
///
/// # Example
/// ```ignore
/// let root = parse_markdown("# Hello\n\nWorld");
/// assert_eq!(root.children.len(), 2);
/// ```
pub fn parse_markdown(markdown: &str) -> Root {
    parse_markdown_with_options(markdown, &MarkdownOptions::default())
}

/// Parse markdown text with custom options.
pub fn parse_markdown_with_options(markdown: &str, options: &MarkdownOptions) -> Root {
    let arena = Arena::new();
    let comrak_options = options.to_comrak_options();

    let document = parse_document(&arena, markdown, &comrak_options);
    let root = Root::new(convert_children(document));

    debug!(
        "Parsed {} bytes of markdown into {} top-level nodes",
        markdown.len(),
        root.children.len()
    );
    root
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal Conversion Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Convert every child of a comrak node, merging adjacent text runs.
fn convert_children<'a>(node: &'a AstNode<'a>) -> Vec<Node> {
    let mut children = Vec::new();
    for child in node.children() {
        if let Some(converted) = convert_node(child) {
            push_merging_text(&mut children, converted);
        }
    }
    children
}

/// Append a node, folding it into the previous one when both are text.
fn push_merging_text(children: &mut Vec<Node>, node: Node) {
    if let Node::Text { value } = &node {
        if value.is_empty() {
            return;
        }
        if let Some(Node::Text { value: previous }) = children.last_mut() {
            previous.push_str(value);
            return;
        }
    }
    children.push(node);
}

/// Convert a single comrak node. Returns `None` for kinds the AST drops.
fn convert_node<'a>(node: &'a AstNode<'a>) -> Option<Node> {
    let ast = node.data.borrow();

    let converted = match &ast.value {
        NodeValue::Heading(heading) => Node::Heading {
            depth: heading.level,
            children: convert_children(node),
        },
        NodeValue::Paragraph => Node::Paragraph {
            children: convert_children(node),
        },
        NodeValue::List(list) => Node::List {
            ordered: matches!(list.list_type, ComrakListType::Ordered),
            children: convert_children(node),
        },
        // Task markers are not modelled; the item keeps its content.
        NodeValue::Item(_) | NodeValue::TaskItem(_) => Node::ListItem {
            children: convert_children(node),
        },
        NodeValue::CodeBlock(code) => Node::Code {
            lang: code
                .info
                .split_whitespace()
                .next()
                .map(|lang| lang.to_string()),
            value: code
                .literal
                .strip_suffix('\n')
                .unwrap_or(&code.literal)
                .to_string(),
        },
        NodeValue::BlockQuote => Node::Blockquote {
            children: convert_children(node),
        },
        NodeValue::ThematicBreak => Node::ThematicBreak,
        NodeValue::HtmlBlock(html) => Node::Html {
            value: html.literal.trim_end_matches('\n').to_string(),
        },
        NodeValue::Table(table) => Node::Table {
            align: table
                .alignments
                .iter()
                .map(|a| TableAlignment::from(*a))
                .collect(),
            children: convert_children(node),
        },
        NodeValue::TableRow(_) => Node::TableRow {
            children: convert_children(node),
        },
        NodeValue::TableCell => Node::TableCell {
            children: convert_children(node),
        },
        NodeValue::Text(text) => Node::Text {
            value: text.clone(),
        },
        NodeValue::SoftBreak => Node::text("\n"),
        NodeValue::LineBreak => Node::Break,
        NodeValue::Code(code) => Node::InlineCode {
            value: code.literal.clone(),
        },
        NodeValue::HtmlInline(html) => Node::Html {
            value: html.clone(),
        },
        NodeValue::Emph => Node::Emphasis {
            children: convert_children(node),
        },
        NodeValue::Strong => Node::Strong {
            children: convert_children(node),
        },
        NodeValue::Strikethrough => Node::Delete {
            children: convert_children(node),
        },
        NodeValue::Link(link) => Node::Link {
            url: link.url.clone(),
            children: convert_children(node),
        },
        NodeValue::Image(image) => Node::Image {
            url: image.url.clone(),
            alt: Root::new(convert_children(node)).text_content(),
        },
        // Front matter, footnotes, description lists and the like
        _ => return None,
    };

    Some(converted)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn first(markdown: &str) -> Node {
        parse_markdown(markdown)
            .children
            .into_iter()
            .next()
            .expect("document has no blocks")
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Basic Parsing Tests
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_empty_document() {
        let root = parse_markdown("");
        assert!(root.children.is_empty());
    }

    #[test]
    fn test_parse_simple_paragraph() {
        let root = parse_markdown("Hello, world!");
        assert_eq!(
            root.children,
            vec![Node::paragraph(vec![Node::text("Hello, world!")])]
        );
    }

    #[test]
    fn test_parse_heading_depths() {
        assert_eq!(first("# Heading 1"), Node::heading(1, vec![Node::text("Heading 1")]));
        assert_eq!(first("### Three"), Node::heading(3, vec![Node::text("Three")]));
        assert_eq!(first("###### Six"), Node::heading(6, vec![Node::text("Six")]));
    }

    #[test]
    fn test_parse_setext_heading() {
        assert_eq!(first("Title\n====="), Node::heading(1, vec![Node::text("Title")]));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // List Tests
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_unordered_list() {
        let list = first("- Item 1\n- Item 2\n- Item 3");
        match list {
            Node::List { ordered, children } => {
                assert!(!ordered);
                assert_eq!(children.len(), 3);
                assert_eq!(
                    children[0],
                    Node::ListItem {
                        children: vec![Node::paragraph(vec![Node::text("Item 1")])]
                    }
                );
            }
            other => panic!("Expected list node, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_ordered_list() {
        match first("1. First\n2. Second\n3. Third") {
            Node::List { ordered, children } => {
                assert!(ordered);
                assert_eq!(children.len(), 3);
            }
            other => panic!("Expected list node, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_task_list_keeps_items() {
        match first("- [ ] Unchecked\n- [x] Checked") {
            Node::List { children, .. } => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[1], Node::ListItem { .. }));
                assert_eq!(children[1].text_content(), "Checked");
            }
            other => panic!("Expected list node, got {:?}", other),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inline Element Tests
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_bold_text_ast_structure() {
        assert_eq!(
            first("This is **bold** text"),
            Node::paragraph(vec![
                Node::text("This is "),
                Node::Strong {
                    children: vec![Node::text("bold")]
                },
                Node::text(" text"),
            ])
        );
    }

    #[test]
    fn test_parse_underscore_emphasis() {
        assert_eq!(
            first("_italic_"),
            Node::paragraph(vec![Node::Emphasis {
                children: vec![Node::text("italic")]
            }])
        );
    }

    #[test]
    fn test_parse_italic_inside_bold() {
        assert_eq!(
            first("**bold _both_**"),
            Node::paragraph(vec![Node::Strong {
                children: vec![
                    Node::text("bold "),
                    Node::Emphasis {
                        children: vec![Node::text("both")]
                    },
                ]
            }])
        );
    }

    #[test]
    fn test_parse_inline_code_and_link() {
        assert_eq!(
            first("Run `cargo` or see [docs](https://example.com)"),
            Node::paragraph(vec![
                Node::text("Run "),
                Node::InlineCode {
                    value: "cargo".into()
                },
                Node::text(" or see "),
                Node::Link {
                    url: "https://example.com".into(),
                    children: vec![Node::text("docs")],
                },
            ])
        );
    }

    #[test]
    fn test_soft_break_folds_into_text() {
        assert_eq!(
            first("line one\nline two"),
            Node::paragraph(vec![Node::text("line one\nline two")])
        );
    }

    #[test]
    fn test_hard_break_is_break_node() {
        assert_eq!(
            first("a\\\nb"),
            Node::paragraph(vec![Node::text("a"), Node::Break, Node::text("b")])
        );
    }

    #[test]
    fn test_parse_strikethrough() {
        assert_eq!(
            first("~~gone~~"),
            Node::paragraph(vec![Node::Delete {
                children: vec![Node::text("gone")]
            }])
        );
    }

    #[test]
    fn test_strikethrough_disabled_is_plain_text() {
        let root = parse_markdown_with_options("~~gone~~", &MarkdownOptions::commonmark());
        assert_eq!(root.children, vec![Node::paragraph(vec![Node::text("~~gone~~")])]);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Block Element Tests
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_code_block() {
        assert_eq!(
            first("```rust title=main.rs\nfn main() {}\n```"),
            Node::Code {
                lang: Some("rust".into()),
                value: "fn main() {}".into()
            }
        );
        assert_eq!(
            first("```\n```"),
            Node::Code {
                lang: None,
                value: String::new()
            }
        );
    }

    #[test]
    fn test_parse_nested_blockquote() {
        assert_eq!(
            first("> outer\n>\n> > inner"),
            Node::Blockquote {
                children: vec![
                    Node::paragraph(vec![Node::text("outer")]),
                    Node::Blockquote {
                        children: vec![Node::paragraph(vec![Node::text("inner")])]
                    },
                ]
            }
        );
    }

    #[test]
    fn test_parse_horizontal_rule() {
        let root = parse_markdown("Above\n\n---\n\nBelow");
        assert_eq!(root.children.len(), 3);
        assert_eq!(root.children[1], Node::ThematicBreak);
    }

    #[test]
    fn test_parse_table() {
        match first("| A | B |\n|:--|--:|\n| 1 | 2 |") {
            Node::Table { align, children } => {
                assert_eq!(align, vec![TableAlignment::Left, TableAlignment::Right]);
                assert_eq!(children.len(), 2);
                assert_eq!(children[1].children()[1].text_content(), "2");
            }
            other => panic!("Expected table node, got {:?}", other),
        }
    }

    #[test]
    fn test_table_disabled_is_paragraph() {
        let root = parse_markdown_with_options(
            "| A | B |\n|---|---|\n| 1 | 2 |",
            &MarkdownOptions::commonmark(),
        );
        assert!(matches!(root.children[0], Node::Paragraph { .. }));
    }

    #[test]
    fn test_parse_image_alt() {
        assert_eq!(
            first("![a *cat*](cat.png)"),
            Node::paragraph(vec![Node::Image {
                url: "cat.png".into(),
                alt: "a cat".into()
            }])
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Graceful Degradation
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_malformed_markdown() {
        let root = parse_markdown("**unclosed bold\n\n[broken link(\n\n```\nunterminated");
        assert_eq!(root.children.len(), 3);
        assert_eq!(
            root.children[0],
            Node::paragraph(vec![Node::text("**unclosed bold")])
        );
        assert!(matches!(root.children[2], Node::Code { .. }));
    }
}
