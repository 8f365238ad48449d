//! Bidirectional sync between the markdown editor and the rich-text surface
//!
//! The coordinator holds the last known markdown, AST and structured document
//! and converts between them whenever either surface reports an edit.
//!
//! # Feedback Loops
//!
//! Pushing a document into the rich-text surface usually makes that surface
//! emit its own change notification, which would call back into
//! [`SyncCoordinator::sync_from_structured`]. A single latch covers the body of
//! both entry points: a call that arrives while a sync is running returns
//! [`SyncOutcome::Skipped`] and is discarded, never queued.
//!
//! # Usage
//!
//! ```ignore
//! let coordinator = SyncCoordinator::new(MarkdownCodec::default());
//! coordinator.bind_surface(Box::new(editor_handle));
//!
//! // Raw editor changed
//! coordinator.sync_from_markdown("# Title");
//!
//! // Rich-text editor changed
//! coordinator.sync_from_structured(&editor_handle);
//! ```

use log::{debug, warn};
use std::cell::{Cell, RefCell};

use crate::markdown::{MarkdownCodec, Root};
use crate::richtext::{to_ast, to_structured, StructuredDoc};

// ─────────────────────────────────────────────────────────────────────────────
// Surface Traits
// ─────────────────────────────────────────────────────────────────────────────

/// A live rich-text editor that can receive documents.
pub trait RichTextSurface {
    /// Whether the editor has been torn down and must not be written to.
    fn is_destroyed(&self) -> bool;

    /// Replace the editor content.
    fn set_content(&mut self, doc: &StructuredDoc);
}

/// Anything that can report the current structured content.
pub trait StructuredSource {
    fn content(&self) -> StructuredDoc;
}

impl StructuredSource for StructuredDoc {
    fn content(&self) -> StructuredDoc {
        self.clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sync Source
// ─────────────────────────────────────────────────────────────────────────────

/// Surface an applied sync originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSource {
    /// Raw markdown editor
    Markdown,
    /// Rich-text editor
    RichText,
}

/// Result of a sync entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Applied(SyncSource),
    /// Another sync was running; the call was dropped
    Skipped,
}

impl SyncOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SyncOutcome::Applied(_))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Latch
// ─────────────────────────────────────────────────────────────────────────────

/// Holds the sync latch for the lifetime of one entry point call.
struct SyncGuard<'a> {
    latch: &'a Cell<bool>,
}

impl<'a> SyncGuard<'a> {
    fn acquire(latch: &'a Cell<bool>) -> Option<Self> {
        if latch.replace(true) {
            return None;
        }
        Some(Self { latch })
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.latch.set(false);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Coordinator
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SyncState {
    markdown: String,
    ast: Root,
    structured: StructuredDoc,
    last_source: Option<SyncSource>,
}

/// Keeps markdown, AST and structured document consistent.
///
/// All methods take `&self` so a bound surface can call back into the
/// coordinator from inside [`RichTextSurface::set_content`].
pub struct SyncCoordinator {
    codec: MarkdownCodec,
    state: RefCell<SyncState>,
    surface: RefCell<Option<Box<dyn RichTextSurface>>>,
    syncing: Cell<bool>,
}

impl SyncCoordinator {
    pub fn new(codec: MarkdownCodec) -> Self {
        Self {
            codec,
            state: RefCell::new(SyncState {
                structured: to_structured(&Root::default()),
                ..SyncState::default()
            }),
            surface: RefCell::new(None),
            syncing: Cell::new(false),
        }
    }

    /// Attach the rich-text editor that receives markdown-driven updates.
    pub fn bind_surface(&self, surface: Box<dyn RichTextSurface>) {
        match self.surface.try_borrow_mut() {
            Ok(mut slot) => *slot = Some(surface),
            Err(_) => warn!("Cannot bind a rich-text surface while it is being updated"),
        }
    }

    /// Detach and return the bound editor, if any.
    pub fn unbind_surface(&self) -> Option<Box<dyn RichTextSurface>> {
        self.surface.try_borrow_mut().ok().and_then(|mut slot| slot.take())
    }

    pub fn has_surface(&self) -> bool {
        self.surface
            .try_borrow()
            .map(|slot| slot.is_some())
            .unwrap_or(true)
    }

    /// Whether a sync is currently running.
    pub fn is_syncing(&self) -> bool {
        self.syncing.get()
    }

    /// Apply an edit made in the markdown editor.
    ///
    /// Parses the text, derives the structured document and pushes it into
    /// the bound surface unless that surface has been destroyed.
    pub fn sync_from_markdown(&self, markdown: &str) -> SyncOutcome {
        let Some(_guard) = SyncGuard::acquire(&self.syncing) else {
            debug!("Dropping re-entrant markdown sync");
            return SyncOutcome::Skipped;
        };

        let ast = self.codec.parse(markdown);
        let structured = to_structured(&ast);

        {
            let mut state = self.state.borrow_mut();
            state.markdown = markdown.to_string();
            state.ast = ast;
            state.structured = structured.clone();
            state.last_source = Some(SyncSource::Markdown);
        }

        // State is committed before the push so callbacks see the new content
        if let Some(surface) = self.surface.borrow_mut().as_mut() {
            if surface.is_destroyed() {
                debug!("Rich-text surface is destroyed, skipping push");
            } else {
                surface.set_content(&structured);
            }
        }

        debug!("Synced {} bytes from markdown", markdown.len());
        SyncOutcome::Applied(SyncSource::Markdown)
    }

    /// Apply an edit made in the rich-text editor.
    ///
    /// Reads the current structured content, converts it to an AST and
    /// serializes the markdown. Nothing is pushed back to the surface.
    pub fn sync_from_structured<S>(&self, source: &S) -> SyncOutcome
    where
        S: StructuredSource + ?Sized,
    {
        let Some(_guard) = SyncGuard::acquire(&self.syncing) else {
            debug!("Dropping re-entrant rich-text sync");
            return SyncOutcome::Skipped;
        };

        let structured = source.content();
        let ast = to_ast(&structured);
        let markdown = self.codec.serialize(&ast);

        let mut state = self.state.borrow_mut();
        debug!("Synced {} bytes from rich text", markdown.len());
        state.markdown = markdown;
        state.ast = ast;
        state.structured = structured;
        state.last_source = Some(SyncSource::RichText);

        SyncOutcome::Applied(SyncSource::RichText)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn markdown(&self) -> String {
        self.state.borrow().markdown.clone()
    }

    pub fn ast(&self) -> Root {
        self.state.borrow().ast.clone()
    }

    pub fn structured(&self) -> StructuredDoc {
        self.state.borrow().structured.clone()
    }

    /// Surface that drove the most recent applied sync.
    pub fn last_source(&self) -> Option<SyncSource> {
        self.state.borrow().last_source
    }

    /// Run a closure against the held AST without cloning it.
    pub fn with_ast<R>(&self, f: impl FnOnce(&Root) -> R) -> R {
        f(&self.state.borrow().ast)
    }
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("codec", &self.codec)
            .field("syncing", &self.syncing.get())
            .field("has_surface", &self.has_surface())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
