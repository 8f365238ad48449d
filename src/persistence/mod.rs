//! Document persistence
//!
//! The service contract for the remote document store, an in-process store
//! with the same versioning rules, and the autosave scheduler.

mod api;
mod memory;
mod scheduler;

pub use api::{Document, DocumentApi, UpdateDocumentRequest, UpdateOutcome, VERSION_HEADER};
pub use memory::MemoryDocumentStore;
pub use scheduler::{
    ConflictAction, PersistenceScheduler, SaveAttempt, SaveEvent, SaveState, SaveStatus,
    SchedulerConfig,
};
