//! Conversion between the markdown AST and the structured document model
//!
//! Both directions are total. Node kinds without a counterpart on the other
//! side are dropped together with their subtree.
//!
//! Nested inline wrappers (`strong`, `emphasis`, `link`, `inlineCode`) are
//! flattened into text runs with an ordered mark list, outermost wrapper
//! first. Going back, marks are re-wrapped in list order, so the first mark
//! becomes the innermost wrapper. A run with a single mark therefore returns
//! to its original shape, while multi-mark runs come back with their nesting
//! inverted and spans that partially overlapped stay split into runs.

use crate::markdown::{Node, Root};
use crate::richtext::model::{CodeBlockAttrs, Mark, StructuredDoc, StructuredNode};

// ─────────────────────────────────────────────────────────────────────────────
// AST → Structured
// ─────────────────────────────────────────────────────────────────────────────

/// Convert an AST into a structured document.
///
/// The result always holds at least one block: an AST without convertible
/// content yields a document with a single empty paragraph.
pub fn to_structured(root: &Root) -> StructuredDoc {
    let mut content: Vec<StructuredNode> = root.children.iter().filter_map(block_to_structured).collect();

    if content.is_empty() {
        content.push(StructuredNode::paragraph(Vec::new()));
    }

    StructuredDoc::new(content)
}

fn block_to_structured(node: &Node) -> Option<StructuredNode> {
    let converted = match node {
        Node::Heading { depth, children } => StructuredNode::heading(*depth, inlines_to_structured(children)),
        Node::Paragraph { children } => StructuredNode::paragraph(inlines_to_structured(children)),
        Node::List { ordered, children } => {
            let content = children
                .iter()
                .filter(|child| matches!(child, Node::ListItem { .. }))
                .filter_map(block_to_structured)
                .collect();
            if *ordered {
                StructuredNode::OrderedList { content }
            } else {
                StructuredNode::BulletList { content }
            }
        }
        Node::ListItem { children } => StructuredNode::ListItem {
            content: blocks_to_structured(children),
        },
        Node::Code { lang, value } => StructuredNode::CodeBlock {
            attrs: CodeBlockAttrs {
                language: lang.clone(),
            },
            content: if value.is_empty() {
                Vec::new()
            } else {
                vec![StructuredNode::text(value.clone())]
            },
        },
        Node::Blockquote { children } => StructuredNode::Blockquote {
            content: blocks_to_structured(children),
        },
        Node::ThematicBreak => StructuredNode::HorizontalRule,
        _ => return None,
    };

    Some(converted)
}

fn blocks_to_structured(nodes: &[Node]) -> Vec<StructuredNode> {
    nodes.iter().filter_map(block_to_structured).collect()
}

fn inlines_to_structured(nodes: &[Node]) -> Vec<StructuredNode> {
    let mut runs = Vec::new();
    let mut marks = Vec::new();
    for node in nodes {
        flatten_inline(node, &mut marks, &mut runs);
    }
    runs
}

/// Walk an inline subtree, emitting one text run per leaf with the marks of
/// every enclosing wrapper.
fn flatten_inline(node: &Node, marks: &mut Vec<Mark>, runs: &mut Vec<StructuredNode>) {
    match node {
        Node::Text { value } => push_run(value, marks, runs),
        Node::InlineCode { value } => {
            let pushed = push_mark(marks, Mark::Code);
            push_run(value, marks, runs);
            if pushed {
                marks.pop();
            }
        }
        Node::Strong { children } => flatten_wrapped(children, Mark::Bold, marks, runs),
        Node::Emphasis { children } => flatten_wrapped(children, Mark::Italic, marks, runs),
        Node::Link { url, children } => flatten_wrapped(children, Mark::link(url.clone()), marks, runs),
        // Strikethrough, breaks, raw HTML and images have no counterpart
        _ => {}
    }
}

fn flatten_wrapped(children: &[Node], mark: Mark, marks: &mut Vec<Mark>, runs: &mut Vec<StructuredNode>) {
    let pushed = push_mark(marks, mark);
    for child in children {
        flatten_inline(child, marks, runs);
    }
    if pushed {
        marks.pop();
    }
}

/// Marks form an ordered set: a wrapper repeating an enclosing mark adds
/// nothing.
fn push_mark(marks: &mut Vec<Mark>, mark: Mark) -> bool {
    if marks.contains(&mark) {
        return false;
    }
    marks.push(mark);
    true
}

fn push_run(text: &str, marks: &[Mark], runs: &mut Vec<StructuredNode>) {
    if !text.is_empty() {
        runs.push(StructuredNode::marked_text(text, marks.to_vec()));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Structured → AST
// ─────────────────────────────────────────────────────────────────────────────

/// Convert a structured document back into an AST.
pub fn to_ast(doc: &StructuredDoc) -> Root {
    Root::new(blocks_to_ast(&doc.content))
}

fn blocks_to_ast(nodes: &[StructuredNode]) -> Vec<Node> {
    nodes.iter().filter_map(block_to_ast).collect()
}

fn block_to_ast(node: &StructuredNode) -> Option<Node> {
    let converted = match node {
        StructuredNode::Heading { attrs, content } => Node::Heading {
            // Missing or zero levels read as 1; others pass through
            depth: attrs.level.max(1),
            children: inlines_to_ast(content),
        },
        StructuredNode::Paragraph { content } => Node::Paragraph {
            children: inlines_to_ast(content),
        },
        StructuredNode::BulletList { content } => Node::List {
            ordered: false,
            children: list_items_to_ast(content),
        },
        StructuredNode::OrderedList { content } => Node::List {
            ordered: true,
            children: list_items_to_ast(content),
        },
        StructuredNode::ListItem { content } => Node::ListItem {
            children: blocks_to_ast(content),
        },
        StructuredNode::CodeBlock { attrs, content } => Node::Code {
            lang: attrs.language.clone().filter(|lang| !lang.is_empty()),
            value: content.iter().map(plain_text).collect(),
        },
        StructuredNode::Blockquote { content } => Node::Blockquote {
            children: blocks_to_ast(content),
        },
        StructuredNode::HorizontalRule => Node::ThematicBreak,
        StructuredNode::Text { .. } | StructuredNode::Unsupported => return None,
    };

    Some(converted)
}

fn list_items_to_ast(nodes: &[StructuredNode]) -> Vec<Node> {
    nodes
        .iter()
        .filter(|node| matches!(node, StructuredNode::ListItem { .. }))
        .filter_map(block_to_ast)
        .collect()
}

fn inlines_to_ast(nodes: &[StructuredNode]) -> Vec<Node> {
    nodes
        .iter()
        .filter_map(|node| match node {
            StructuredNode::Text { text, marks } => Some(wrap_marks(text, marks)),
            _ => None,
        })
        .collect()
}

/// Rebuild the wrapper chain for one run. A code mark turns the leaf into
/// inline code; every other mark wraps the node built so far.
fn wrap_marks(text: &str, marks: &[Mark]) -> Node {
    let mut current = if marks.contains(&Mark::Code) {
        Node::InlineCode {
            value: text.to_string(),
        }
    } else {
        Node::text(text)
    };

    for mark in marks {
        current = match mark {
            Mark::Bold => Node::Strong {
                children: vec![current],
            },
            Mark::Italic => Node::Emphasis {
                children: vec![current],
            },
            Mark::Link { attrs } => Node::Link {
                url: attrs.href.clone(),
                children: vec![current],
            },
            Mark::Code | Mark::Unsupported => current,
        };
    }

    current
}

fn plain_text(node: &StructuredNode) -> String {
    match node {
        StructuredNode::Text { text, .. } => text.clone(),
        other => other.content().iter().map(plain_text).collect(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
