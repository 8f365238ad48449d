//! Structured document model and the tree transformer
//!
//! The rich-text surface edits a block/inline JSON tree rather than markdown.
//! This module defines that tree and converts it to and from the markdown AST.

pub mod model;
mod transform;

pub use model::{CodeBlockAttrs, HeadingAttrs, LinkAttrs, Mark, StructuredDoc, StructuredNode};
pub use transform::{to_ast, to_structured};
