//! Markdown parsing and serialization module
//!
//! This module converts between markdown text and a portable, mdast-like AST
//! using the comrak library, a CommonMark + GFM compatible parser.
//!
//! # Features
//! - Parse markdown text to an owned AST ([`Root`] / [`Node`])
//! - Serialize the AST back to markdown in a fixed house style
//! - Configurable grammar extensions (tables, strikethrough, autolinks, tasks)
//!
//! # Example
//! ```ignore
//! use dualmark::markdown::{MarkdownCodec, MarkdownOptions};
//!
//! let codec = MarkdownCodec::new(MarkdownOptions::default());
//! let root = codec.parse("# Hello\n\nThis is **bold** text.");
//! assert_eq!(codec.serialize(&root), "# Hello\n\nThis is **bold** text.\n");
//! ```

pub mod ast;
mod parser;
mod serializer;

pub use ast::{Node, Root, TableAlignment};
pub use parser::{parse_markdown, parse_markdown_with_options, MarkdownOptions};
pub use serializer::serialize_markdown;

/// Parser and serializer bound to one set of grammar options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkdownCodec {
    options: MarkdownOptions,
}

impl MarkdownCodec {
    pub fn new(options: MarkdownOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MarkdownOptions {
        &self.options
    }

    /// Parse markdown into an AST. Never fails.
    pub fn parse(&self, markdown: &str) -> Root {
        parse_markdown_with_options(markdown, &self.options)
    }

    /// Serialize an AST to markdown. Never fails.
    pub fn serialize(&self, root: &Root) -> String {
        serialize_markdown(root)
    }

    /// Parse and re-serialize, bringing text into the house style.
    pub fn normalize(&self, markdown: &str) -> String {
        self.serialize(&self.parse(markdown))
    }
}
