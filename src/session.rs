//! Editing session state for dualmark
//!
//! An `EditingSession` ties one persisted document to the sync coordinator,
//! the heading outline and the autosave scheduler. Every applied edit, from
//! either surface, recomputes the outline and hands changed markdown to the
//! scheduler.

use log::{debug, info};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Settings;
use crate::editor::{
    Outline, OutlineExtractor, RichTextSurface, StructuredSource, SyncCoordinator, SyncOutcome,
};
use crate::error::Result;
use crate::markdown::{MarkdownCodec, Root};
use crate::persistence::{
    ConflictAction, Document, DocumentApi, PersistenceScheduler, SaveAttempt, SaveEvent, SaveStatus,
    SchedulerConfig,
};
use crate::richtext::StructuredDoc;

/// One open document with both editing surfaces and autosave.
///
/// Must be used from within a tokio runtime; the autosave timers run as
/// tasks on it.
pub struct EditingSession<A: DocumentApi> {
    /// Document as last fetched from the store
    document: Document,
    sync: SyncCoordinator,
    extractor: OutlineExtractor,
    outline: Outline,
    scheduler: PersistenceScheduler<A>,
    /// Markdown most recently loaded from or handed to the store
    saved_content: String,
}

impl<A: DocumentApi> EditingSession<A> {
    /// Fetch the project's document and start editing it.
    pub async fn open(api: Arc<A>, project_id: Uuid, settings: &Settings) -> Result<Self> {
        let document = api.fetch_for_project(project_id).await?;

        let sync = SyncCoordinator::new(MarkdownCodec::new(settings.markdown.clone()));
        sync.sync_from_markdown(&document.content_md);

        let mut extractor = OutlineExtractor::new();
        let outline = sync.with_ast(|ast| extractor.extract(ast));

        let scheduler =
            PersistenceScheduler::new(api, &document, SchedulerConfig::from(&settings.autosave));
        scheduler.start();

        info!(
            "Opened document {} at version {} ({})",
            document.id,
            document.version,
            outline.summary()
        );

        Ok(Self {
            saved_content: document.content_md.clone(),
            document,
            sync,
            extractor,
            outline,
            scheduler,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Edits
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply an edit from the markdown editor.
    pub fn edit_markdown(&mut self, markdown: &str) -> SyncOutcome {
        let outcome = self.sync.sync_from_markdown(markdown);
        if outcome.is_applied() {
            self.after_sync(true);
        }
        outcome
    }

    /// Apply an edit from the rich-text editor.
    pub fn edit_structured<S>(&mut self, source: &S) -> SyncOutcome
    where
        S: StructuredSource + ?Sized,
    {
        let outcome = self.sync.sync_from_structured(source);
        if outcome.is_applied() {
            self.after_sync(true);
        }
        outcome
    }

    /// Recompute the outline and, when asked, queue changed markdown.
    fn after_sync(&mut self, persist: bool) {
        // Reset first so ids stay stable across recomputations
        self.extractor.reset();
        let extractor = &mut self.extractor;
        self.outline = self.sync.with_ast(|ast| extractor.extract(ast));

        let markdown = self.sync.markdown();
        if !persist || markdown == self.saved_content {
            self.saved_content = markdown;
            return;
        }

        debug!("Queueing {} bytes for autosave", markdown.len());
        self.scheduler.save(markdown.clone());
        self.saved_content = markdown;
    }

    /// Attach the rich-text editor and load the current document into it.
    pub fn bind_surface(&self, mut surface: Box<dyn RichTextSurface>) {
        if !surface.is_destroyed() {
            surface.set_content(&self.sync.structured());
        }
        self.sync.bind_surface(surface);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    /// Leave a save conflict.
    ///
    /// On `Reload` the stored markdown replaces the local content in both
    /// surfaces. On `Overwrite` the local content is kept and resubmitted.
    pub async fn resolve_conflict(&mut self, action: ConflictAction) -> Result<Document> {
        let latest = self.scheduler.resolve_conflict(action).await?;
        self.document = latest.clone();

        if action == ConflictAction::Reload {
            self.sync.sync_from_markdown(&latest.content_md);
            self.saved_content = latest.content_md.clone();
            self.after_sync(false);
        }

        Ok(latest)
    }

    /// Save pending content now.
    pub async fn flush(&self) -> SaveAttempt {
        self.scheduler.flush().await
    }

    /// Flush pending content and stop the autosave timers.
    pub async fn close(self) -> SaveAttempt {
        let attempt = self.scheduler.flush().await;
        self.scheduler.shutdown();
        info!("Closed document {} ({:?})", self.document.id, attempt);
        attempt
    }

    /// Receive autosave events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SaveEvent> {
        self.scheduler.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn markdown(&self) -> String {
        self.sync.markdown()
    }

    pub fn ast(&self) -> Root {
        self.sync.ast()
    }

    pub fn structured(&self) -> StructuredDoc {
        self.sync.structured()
    }

    pub fn outline(&self) -> &Outline {
        &self.outline
    }

    pub fn save_status(&self) -> SaveStatus {
        self.scheduler.status()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Check if there is content the store has not accepted yet.
    pub fn has_unsaved_changes(&self) -> bool {
        self.scheduler.status().has_pending
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::persistence::{MemoryDocumentStore, SaveState};
    use crate::richtext::StructuredNode;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;
    use tokio::time;

    #[derive(Clone, Default)]
    struct RecordingSurface {
        pushed: Rc<RefCell<Vec<StructuredDoc>>>,
    }

    impl RichTextSurface for RecordingSurface {
        fn is_destroyed(&self) -> bool {
            false
        }

        fn set_content(&mut self, doc: &StructuredDoc) {
            self.pushed.borrow_mut().push(doc.clone());
        }
    }

    async fn open_with(content: &str) -> (Arc<MemoryDocumentStore>, Document, EditingSession<MemoryDocumentStore>) {
        let store = Arc::new(MemoryDocumentStore::new());
        let project_id = Uuid::new_v4();
        let document = store.create(project_id, content);
        let session = EditingSession::open(Arc::clone(&store), project_id, &Settings::default())
            .await
            .unwrap();
        (store, document, session)
    }

    fn debounce() -> Duration {
        Duration::from_millis(1100)
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_loads_document() {
        let (_, document, session) = open_with("# Title\n\n## Section\n\nText\n").await;

        assert_eq!(session.document(), &document);
        assert_eq!(session.markdown(), "# Title\n\n## Section\n\nText\n");
        assert_eq!(session.ast().children.len(), 3);
        assert_eq!(session.outline().heading_count(), 2);
        assert_eq!(session.outline().headings[0].id, "heading-1");
        assert_eq!(session.save_status().state, SaveState::Idle);
        assert!(!session.has_unsaved_changes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_unknown_project_fails() {
        let store = Arc::new(MemoryDocumentStore::new());
        let result = EditingSession::open(store, Uuid::new_v4(), &Settings::default()).await;
        assert!(matches!(result, Err(Error::DocumentNotFound { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_markdown_edit_updates_outline_and_saves() {
        let (store, document, mut session) = open_with("# Title\n").await;

        session.edit_markdown("# Title\n\n## Added\n");
        assert_eq!(session.outline().heading_count(), 2);
        // Ids restart on every recomputation
        assert_eq!(session.outline().headings[0].id, "heading-1");
        assert_eq!(session.outline().headings[0].children[0].id, "heading-2");
        assert!(session.has_unsaved_changes());

        time::sleep(debounce()).await;

        let stored = store.get(document.id).unwrap();
        assert_eq!(stored.content_md, "# Title\n\n## Added\n");
        assert_eq!(stored.version, 2);
        assert_eq!(session.save_status().version, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_markdown_is_not_saved() {
        let (store, document, mut session) = open_with("Same\n").await;

        assert!(session.edit_markdown("Same\n").is_applied());
        assert!(!session.has_unsaved_changes());

        time::sleep(debounce()).await;
        assert_eq!(store.get(document.id).unwrap().version, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_structured_edit_saves_serialized_markdown() {
        let (store, document, mut session) = open_with("old\n").await;

        let doc = StructuredDoc::new(vec![
            StructuredNode::heading(1, vec![StructuredNode::text("New")]),
            StructuredNode::paragraph(vec![StructuredNode::text("Body")]),
        ]);
        session.edit_structured(&doc);

        assert_eq!(session.markdown(), "# New\n\nBody\n");
        assert_eq!(session.outline().headings[0].text, "New");

        time::sleep(debounce()).await;
        assert_eq!(store.get(document.id).unwrap().content_md, "# New\n\nBody\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_surface_receives_current_document() {
        let (_, _, mut session) = open_with("hello\n").await;
        let surface = RecordingSurface::default();

        session.bind_surface(Box::new(surface.clone()));
        assert_eq!(surface.pushed.borrow()[0].text_content(), "hello");

        session.edit_markdown("changed\n");
        assert_eq!(surface.pushed.borrow().len(), 2);
        assert_eq!(surface.pushed.borrow()[1].text_content(), "changed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflict_then_reload_adopts_stored_content() {
        let (store, document, mut session) = open_with("base\n").await;
        let surface = RecordingSurface::default();
        session.bind_surface(Box::new(surface.clone()));

        store.overwrite_externally(document.id, "# Theirs\n").unwrap();
        session.edit_markdown("mine\n");
        time::sleep(debounce()).await;
        assert_eq!(session.save_status().state, SaveState::Conflict);

        let latest = session.resolve_conflict(ConflictAction::Reload).await.unwrap();
        assert_eq!(latest.version, 2);
        assert_eq!(session.document().version, 2);
        assert_eq!(session.markdown(), "# Theirs\n");
        assert_eq!(session.outline().headings[0].text, "Theirs");
        assert_eq!(surface.pushed.borrow().last().unwrap().text_content(), "Theirs");
        assert!(!session.has_unsaved_changes());

        time::sleep(debounce()).await;
        assert_eq!(store.get(document.id).unwrap().content_md, "# Theirs\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflict_then_overwrite_keeps_local_content() {
        let (store, document, mut session) = open_with("base\n").await;

        store.overwrite_externally(document.id, "theirs\n").unwrap();
        session.edit_markdown("mine\n");
        time::sleep(debounce()).await;

        session.resolve_conflict(ConflictAction::Overwrite).await.unwrap();

        let stored = store.get(document.id).unwrap();
        assert_eq!(stored.content_md, "mine\n");
        assert_eq!(stored.version, 3);
        assert_eq!(session.markdown(), "mine\n");
        assert_eq!(session.save_status().state, SaveState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_flushes_pending_content() {
        let (store, document, mut session) = open_with("draft\n").await;

        session.edit_markdown("final\n");
        assert_eq!(session.close().await, SaveAttempt::Saved(2));
        assert_eq!(store.get(document.id).unwrap().content_md, "final\n");
    }
}
