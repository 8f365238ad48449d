//! dualmark - markdown text, markdown AST and a rich-text document model kept
//! in sync, with versioned autosave.
//!
//! # Modules
//! - [`markdown`]: parse markdown to an AST and serialize it back
//! - [`richtext`]: the structured document model and the AST transformer
//! - [`editor`]: heading outline and the two-surface sync coordinator
//! - [`persistence`]: document store contract and the autosave scheduler
//! - [`session`]: one open document with all of the above wired together
//! - [`config`]: user settings persisted as JSON

pub mod config;
pub mod editor;
pub mod error;
pub mod markdown;
pub mod persistence;
pub mod richtext;
pub mod session;

pub use error::{Error, Result};
pub use session::EditingSession;
