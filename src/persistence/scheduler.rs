//! Autosave scheduling with optimistic versioning
//!
//! The scheduler buffers the most recent content in a single pending slot and
//! writes it to the [`DocumentApi`] from two independent timers:
//!
//! - a trailing-edge debounce timer, re-armed by every [`PersistenceScheduler::save`]
//! - a fixed-period interval timer, started by [`PersistenceScheduler::start`],
//!   that catches continuous typing which keeps pushing the debounce back
//!
//! Only one write is in flight at a time. A save requested while one is
//! running is dropped, not queued; the timers pick up whatever is in the slot
//! afterwards. A version conflict halts automatic saving until
//! [`PersistenceScheduler::resolve_conflict`] is called.
//!
//! The shared state sits behind a `std::sync::Mutex` that is never held across
//! an `.await`.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::config::AutosaveSettings;
use crate::error::{Error, Result};
use crate::persistence::api::{Document, DocumentApi, UpdateOutcome};

/// Capacity of the save event channel.
const EVENT_CAPACITY: usize = 32;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Timer periods for autosave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Quiet period after the last edit before saving (default: 1s)
    pub debounce: Duration,
    /// Period of the backstop flush (default: 30s)
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1000),
            interval: Duration::from_millis(30_000),
        }
    }
}

impl SchedulerConfig {
    /// Replace a zero interval, which the backstop timer cannot run with.
    fn checked(self) -> Self {
        if !self.interval.is_zero() {
            return self;
        }
        let interval = Self::default().interval;
        warn!("Autosave interval must be positive, using {:?}", interval);
        Self { interval, ..self }
    }
}

/// Timer periods are clamped to the ranges settings files are held to.
impl From<&AutosaveSettings> for SchedulerConfig {
    fn from(settings: &AutosaveSettings) -> Self {
        let settings = settings.sanitized();
        Self {
            debounce: Duration::from_millis(settings.debounce_ms),
            interval: Duration::from_millis(settings.interval_ms),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// States and Events
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle state of the save pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveState {
    /// Nothing scheduled
    #[default]
    Idle,
    /// Content is buffered and the debounce timer is armed
    PendingDebounce,
    /// A write is in flight
    Saving,
    /// The store rejected a stale version; automatic saving is halted
    Conflict,
}

/// How to leave the conflict state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAction {
    /// Drop the pending content and adopt the stored document
    Reload,
    /// Adopt the stored version, then resubmit the pending content over it
    Overwrite,
}

/// Notification broadcast after every completed write attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveEvent {
    Saved { version: i64, at: DateTime<Utc> },
    Conflict,
    Failed { message: String },
}

/// Result of one attempt to write the pending slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveAttempt {
    /// Accepted; carries the new version
    Saved(i64),
    Conflict,
    /// The write failed; the pending content was kept
    Failed(String),
    /// Nothing was written: the slot was empty, a write was in flight, or a
    /// conflict is pending
    Skipped,
}

/// Snapshot of the scheduler for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveStatus {
    pub state: SaveState,
    /// Last version acknowledged by the store
    pub version: i64,
    pub has_pending: bool,
    pub last_saved: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Debounce,
    Interval,
    Flush,
    Resolve,
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared State
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Shared {
    state: SaveState,
    document_id: Uuid,
    project_id: Uuid,
    version: i64,
    pending: Option<String>,
    in_flight: bool,
    last_saved: Option<DateTime<Utc>>,
    last_error: Option<String>,
    debounce: Option<JoinHandle<()>>,
    debounce_generation: u64,
    interval: Option<JoinHandle<()>>,
}

impl Shared {
    /// Leave `Saving` for whichever resting state matches the timers.
    fn settle(&mut self) {
        self.state = if self.debounce.is_some() {
            SaveState::PendingDebounce
        } else {
            SaveState::Idle
        };
    }

    fn cancel_debounce(&mut self) {
        if let Some(handle) = self.debounce.take() {
            handle.abort();
        }
    }
}

struct Inner<A: DocumentApi> {
    api: Arc<A>,
    config: SchedulerConfig,
    shared: Mutex<Shared>,
    events: broadcast::Sender<SaveEvent>,
}

impl<A: DocumentApi> Inner<A> {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SaveEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Write the pending slot once, honoring the in-flight and conflict guards.
    async fn perform_save(&self, trigger: Trigger) -> SaveAttempt {
        let (document_id, content, version) = {
            let mut shared = self.lock();
            if shared.state == SaveState::Conflict {
                debug!("Save ({:?}) skipped: conflict pending", trigger);
                return SaveAttempt::Skipped;
            }
            if shared.in_flight {
                debug!("Save ({:?}) dropped: another save is in flight", trigger);
                return SaveAttempt::Skipped;
            }
            let Some(content) = shared.pending.clone() else {
                return SaveAttempt::Skipped;
            };
            shared.in_flight = true;
            shared.state = SaveState::Saving;
            (shared.document_id, content, shared.version)
        };

        debug!(
            "Saving {} bytes to document {} at version {} ({:?})",
            content.len(),
            document_id,
            version,
            trigger
        );

        let mut flight = FlightGuard {
            inner: self,
            landed: false,
        };
        let result = self.api.update(document_id, &content, version).await;
        flight.landed = true;

        let (attempt, event) = {
            let mut shared = self.lock();
            shared.in_flight = false;

            match result {
                Ok(UpdateOutcome::Saved(document)) => {
                    let at = Utc::now();
                    shared.version = document.version;
                    // Content buffered during the flight stays for the next tick
                    if shared.pending.as_deref() == Some(content.as_str()) {
                        shared.pending = None;
                    }
                    shared.last_saved = Some(at);
                    shared.last_error = None;
                    shared.settle();
                    info!("Saved document {} at version {}", document_id, document.version);
                    (
                        SaveAttempt::Saved(document.version),
                        SaveEvent::Saved {
                            version: document.version,
                            at,
                        },
                    )
                }
                Ok(UpdateOutcome::Conflict) => {
                    shared.cancel_debounce();
                    shared.state = SaveState::Conflict;
                    warn!(
                        "Version conflict saving document {} at version {}; autosave halted",
                        document_id, version
                    );
                    (SaveAttempt::Conflict, SaveEvent::Conflict)
                }
                Err(err) => {
                    let message = err.to_string();
                    if err.is_transient() {
                        warn!("Save of document {} failed, will retry: {}", document_id, message);
                    } else {
                        error!("Save of document {} failed: {}", document_id, message);
                    }
                    shared.last_error = Some(message.clone());
                    shared.settle();
                    (
                        SaveAttempt::Failed(message.clone()),
                        SaveEvent::Failed { message },
                    )
                }
            }
        };

        self.emit(event);
        attempt
    }

    /// Called by the debounce task once its quiet period has elapsed.
    async fn fire_debounce(&self, generation: u64) {
        {
            let mut shared = self.lock();
            if shared.debounce_generation != generation {
                return;
            }
            // Detach so re-arming never aborts the save below
            shared.debounce = None;
            if shared.state == SaveState::PendingDebounce {
                shared.state = SaveState::Idle;
            }
        }
        self.perform_save(Trigger::Debounce).await;
    }
}

impl<A: DocumentApi> Drop for Inner<A> {
    fn drop(&mut self) {
        let shared = self.shared.get_mut().unwrap_or_else(PoisonError::into_inner);
        shared.cancel_debounce();
        if let Some(handle) = shared.interval.take() {
            handle.abort();
        }
    }
}

/// Clears the in-flight flag if a save is cancelled before the store answers.
struct FlightGuard<'a, A: DocumentApi> {
    inner: &'a Inner<A>,
    landed: bool,
}

impl<A: DocumentApi> Drop for FlightGuard<'_, A> {
    fn drop(&mut self) {
        if !self.landed {
            let mut shared = self.inner.lock();
            shared.in_flight = false;
            if shared.state == SaveState::Saving {
                shared.settle();
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scheduler
// ─────────────────────────────────────────────────────────────────────────────

/// Debounced, versioned autosave for one document.
///
/// Cheap to clone; all clones drive the same pipeline. Timers run as tokio
/// tasks, so `save` and `start` must be called from within a runtime.
pub struct PersistenceScheduler<A: DocumentApi> {
    inner: Arc<Inner<A>>,
}

impl<A: DocumentApi> Clone for PersistenceScheduler<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: DocumentApi> PersistenceScheduler<A> {
    /// Create a scheduler whose baseline is the given document's version.
    ///
    /// A zero interval is replaced with the default one.
    pub fn new(api: Arc<A>, document: &Document, config: SchedulerConfig) -> Self {
        let config = config.checked();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                api,
                config,
                shared: Mutex::new(Shared {
                    state: SaveState::Idle,
                    document_id: document.id,
                    project_id: document.project_id,
                    version: document.version,
                    pending: None,
                    in_flight: false,
                    last_saved: None,
                    last_error: None,
                    debounce: None,
                    debounce_generation: 0,
                    interval: None,
                }),
                events,
            }),
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.inner.config
    }

    /// Start the interval backstop timer. Calling it again has no effect.
    pub fn start(&self) {
        let mut shared = self.inner.lock();
        if shared.interval.is_some() {
            return;
        }

        let period = self.inner.config.interval;
        let weak: Weak<Inner<A>> = Arc::downgrade(&self.inner);
        shared.interval = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.perform_save(Trigger::Interval).await;
            }
        }));
        debug!("Autosave interval started ({:?})", period);
    }

    /// Buffer content for saving and (re)arm the debounce timer.
    ///
    /// The previous buffered content is replaced. While a conflict is pending
    /// the content is buffered but no timer is armed.
    pub fn save(&self, content: impl Into<String>) {
        let mut shared = self.inner.lock();
        shared.pending = Some(content.into());

        if shared.state == SaveState::Conflict {
            debug!("Buffered content while a conflict is pending");
            return;
        }

        shared.cancel_debounce();
        shared.debounce_generation += 1;
        let generation = shared.debounce_generation;
        let delay = self.inner.config.debounce;
        let weak = Arc::downgrade(&self.inner);

        shared.debounce = Some(tokio::spawn(async move {
            time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire_debounce(generation).await;
            }
        }));

        if !shared.in_flight {
            shared.state = SaveState::PendingDebounce;
        }
    }

    /// Save the pending content now instead of waiting for a timer.
    pub async fn flush(&self) -> SaveAttempt {
        {
            let mut shared = self.inner.lock();
            if shared.state != SaveState::Conflict && !shared.in_flight {
                shared.cancel_debounce();
                if shared.state == SaveState::PendingDebounce {
                    shared.state = SaveState::Idle;
                }
            }
        }
        self.inner.perform_save(Trigger::Flush).await
    }

    /// Leave the conflict state.
    ///
    /// Both actions re-fetch the stored document and adopt its version.
    /// `Reload` discards the pending content; `Overwrite` immediately
    /// resubmits it under the fetched version. If the fetch fails the
    /// scheduler stays in conflict.
    pub async fn resolve_conflict(&self, action: ConflictAction) -> Result<Document> {
        let project_id = {
            let shared = self.inner.lock();
            if shared.state != SaveState::Conflict {
                return Err(Error::NoConflict);
            }
            shared.project_id
        };

        let latest = self.inner.api.fetch_for_project(project_id).await?;

        let resubmit = {
            let mut shared = self.inner.lock();
            shared.document_id = latest.id;
            shared.version = latest.version;
            shared.last_error = None;
            shared.state = SaveState::Idle;
            match action {
                ConflictAction::Reload => {
                    shared.pending = None;
                    false
                }
                ConflictAction::Overwrite => shared.pending.is_some(),
            }
        };

        info!(
            "Resolved conflict on document {} by {:?} at version {}",
            latest.id, action, latest.version
        );

        if resubmit {
            self.inner.perform_save(Trigger::Resolve).await;
        }

        Ok(latest)
    }

    /// Stop both timers. Buffered content is kept and can still be flushed.
    pub fn shutdown(&self) {
        let mut shared = self.inner.lock();
        shared.cancel_debounce();
        if let Some(handle) = shared.interval.take() {
            handle.abort();
        }
        if shared.state == SaveState::PendingDebounce {
            shared.state = SaveState::Idle;
        }
        debug!("Autosave timers stopped for document {}", shared.document_id);
    }

    /// Receive an event after every completed write attempt.
    pub fn subscribe(&self) -> broadcast::Receiver<SaveEvent> {
        self.inner.events.subscribe()
    }

    pub fn status(&self) -> SaveStatus {
        let shared = self.inner.lock();
        SaveStatus {
            state: shared.state,
            version: shared.version,
            has_pending: shared.pending.is_some(),
            last_saved: shared.last_saved,
            last_error: shared.last_error.clone(),
        }
    }

    pub fn state(&self) -> SaveState {
        self.inner.lock().state
    }

    pub fn version(&self) -> i64 {
        self.inner.lock().version
    }

    pub fn document_id(&self) -> Uuid {
        self.inner.lock().document_id
    }
}

impl<A: DocumentApi> std::fmt::Debug for PersistenceScheduler<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceScheduler")
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
