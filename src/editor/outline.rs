//! Document outline / Table of Contents module
//!
//! This module derives a heading tree from a markdown AST. Only top-level
//! headings of depth 1 to 3 take part; deeper headings are left out entirely.
//!
//! Heading ids come from a counter owned by [`OutlineExtractor`]. The counter
//! keeps running across extractions until [`OutlineExtractor::reset`] is
//! called, so callers that replace a previous outline should reset first.

use serde::{Deserialize, Serialize};

use crate::markdown::{Node, Root};

/// Deepest heading level included in the outline.
pub const MAX_OUTLINE_LEVEL: u8 = 3;

// ─────────────────────────────────────────────────────────────────────────────
// HeadingNode
// ─────────────────────────────────────────────────────────────────────────────

/// A heading in the outline, with the headings nested beneath it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingNode {
    /// Session-scoped id (`heading-N`)
    pub id: String,
    /// Heading text with inline formatting removed
    pub text: String,
    /// Heading level (1-3)
    pub level: u8,
    #[serde(default)]
    pub children: Vec<HeadingNode>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Outline
// ─────────────────────────────────────────────────────────────────────────────

/// A forest of headings in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outline {
    pub headings: Vec<HeadingNode>,
}

impl Outline {
    /// Create a new empty outline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the outline is empty.
    pub fn is_empty(&self) -> bool {
        self.headings.is_empty()
    }

    /// Every heading in pre-order, paired with its nesting depth (0 for roots).
    pub fn flatten(&self) -> Vec<(usize, &HeadingNode)> {
        fn walk<'a>(nodes: &'a [HeadingNode], depth: usize, out: &mut Vec<(usize, &'a HeadingNode)>) {
            for node in nodes {
                out.push((depth, node));
                walk(&node.children, depth + 1, out);
            }
        }

        let mut out = Vec::new();
        walk(&self.headings, 0, &mut out);
        out
    }

    /// Find a heading anywhere in the tree by id.
    pub fn find(&self, id: &str) -> Option<&HeadingNode> {
        self.flatten()
            .into_iter()
            .map(|(_, node)| node)
            .find(|node| node.id == id)
    }

    /// Total number of headings, nested ones included.
    pub fn heading_count(&self) -> usize {
        self.flatten().len()
    }

    /// Get the number of headings at each level.
    pub fn level_counts(&self) -> [usize; MAX_OUTLINE_LEVEL as usize] {
        let mut counts = [0usize; MAX_OUTLINE_LEVEL as usize];
        for (_, node) in self.flatten() {
            if (1..=MAX_OUTLINE_LEVEL).contains(&node.level) {
                counts[(node.level - 1) as usize] += 1;
            }
        }
        counts
    }

    /// Get a summary string like "3 H1, 5 H2, 2 H3"
    pub fn summary(&self) -> String {
        let counts = self.level_counts();
        let mut parts = Vec::new();
        for (i, &count) in counts.iter().enumerate() {
            if count > 0 {
                parts.push(format!("{} H{}", count, i + 1));
            }
        }
        if parts.is_empty() {
            "No headings".to_string()
        } else {
            parts.join(", ")
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extraction
// ─────────────────────────────────────────────────────────────────────────────

/// Builds outlines and issues heading ids.
#[derive(Debug, Default)]
pub struct OutlineExtractor {
    counter: u64,
}

impl OutlineExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart id generation at `heading-1`.
    pub fn reset(&mut self) {
        self.counter = 0;
    }

    /// Number of ids issued since creation or the last reset.
    pub fn issued(&self) -> u64 {
        self.counter
    }

    fn next_id(&mut self) -> String {
        self.counter += 1;
        format!("heading-{}", self.counter)
    }

    /// Build the heading tree for an AST.
    ///
    /// Each qualifying heading closes every open heading at the same or a
    /// deeper level and becomes a child of the nearest shallower one, or a
    /// root when none is open.
    pub fn extract(&mut self, root: &Root) -> Outline {
        let mut roots: Vec<HeadingNode> = Vec::new();
        // Open headings along the current nesting path, shallowest first
        let mut stack: Vec<HeadingNode> = Vec::new();

        for node in &root.children {
            let Node::Heading { depth, .. } = node else {
                continue;
            };
            if *depth > MAX_OUTLINE_LEVEL {
                continue;
            }

            while stack.last().is_some_and(|open| open.level >= *depth) {
                close_heading(&mut stack, &mut roots);
            }

            stack.push(HeadingNode {
                id: self.next_id(),
                text: heading_text(node),
                level: *depth,
                children: Vec::new(),
            });
        }

        while !stack.is_empty() {
            close_heading(&mut stack, &mut roots);
        }

        Outline { headings: roots }
    }
}

/// Pop the innermost open heading and attach it to its parent.
fn close_heading(stack: &mut Vec<HeadingNode>, roots: &mut Vec<HeadingNode>) {
    if let Some(done) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.children.push(done),
            None => roots.push(done),
        }
    }
}

/// Concatenate the text leaves under a heading in document order.
///
/// Returns an empty string for a heading without text.
pub fn heading_text(node: &Node) -> String {
    fn collect(nodes: &[Node], out: &mut String) {
        for node in nodes {
            match node {
                Node::Text { value } => out.push_str(value),
                other => collect(other.children(), out),
            }
        }
    }

    let mut text = String::new();
    collect(node.children(), &mut text);
    text
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
