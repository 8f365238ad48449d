//! Editor module for dualmark
//!
//! This module contains the pieces that sit between the two editing
//! surfaces: the heading outline and the sync coordinator.

mod outline;
mod sync;

pub use outline::{heading_text, HeadingNode, Outline, OutlineExtractor, MAX_OUTLINE_LEVEL};
pub use sync::{RichTextSurface, StructuredSource, SyncCoordinator, SyncOutcome, SyncSource};
