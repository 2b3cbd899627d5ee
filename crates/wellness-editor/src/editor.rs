//! Auto-saving editor for a single session record.
//!
//! Every field edit marks the buffer dirty and restarts a 5 second
//! debounce timer. When the timer fires the buffer is saved as a draft,
//! unless it is entirely empty. Explicit save and publish skip the timer.
//! Only one save runs at a time per editor; requests made while one is in
//! flight are refused, never queued.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use wellness_types::api::SessionPayload;
use wellness_types::models::SessionRecord;
use wellness_types::rules::{check_publishable, parse_tags};

use crate::debounce::DebounceTimer;
use crate::error::{EditorError, StoreError};
use crate::notify::{NoticeKind, Notifier};

pub const AUTOSAVE_DELAY: Duration = Duration::from_secs(5);

/// Persistence used by the editor.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Create or update (when `payload.id` is set) with status draft.
    async fn persist_draft(&self, payload: SessionPayload) -> Result<SessionRecord, StoreError>;

    /// Create or update with status published.
    async fn persist_published(&self, payload: SessionPayload)
    -> Result<SessionRecord, StoreError>;
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn persist_draft(&self, payload: SessionPayload) -> Result<SessionRecord, StoreError> {
        (**self).persist_draft(payload).await
    }

    async fn persist_published(
        &self,
        payload: SessionPayload,
    ) -> Result<SessionRecord, StoreError> {
        (**self).persist_published(payload).await
    }
}

/// Local copy of the fields being edited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftBuffer {
    /// `None` until the first successful save allocates one.
    pub id: Option<Uuid>,
    pub title: String,
    /// Raw comma-separated input, parsed on save.
    pub tags_input: String,
    pub json_file_url: String,
}

impl DraftBuffer {
    pub fn from_record(record: &SessionRecord) -> Self {
        Self {
            id: Some(record.id),
            title: record.title.clone(),
            tags_input: record.tags.join(", "),
            json_file_url: record.json_file_url.clone(),
        }
    }

    /// No title, no URL and no tags.
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty()
            && self.json_file_url.trim().is_empty()
            && parse_tags(&self.tags_input).is_empty()
    }

    pub fn tags(&self) -> Vec<String> {
        parse_tags(&self.tags_input)
    }

    pub fn to_payload(&self) -> SessionPayload {
        SessionPayload {
            id: self.id,
            title: self.title.trim().to_string(),
            tags: self.tags(),
            json_file_url: self.json_file_url.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Clean,
    Dirty,
    Saving,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSnapshot {
    pub buffer: DraftBuffer,
    pub phase: Phase,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub autosave_pending: bool,
}

/// Returned by [`Editor::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseOutcome {
    pub unsaved_changes: bool,
    pub save_in_flight: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveKind {
    Auto,
    Draft,
    Publish,
}

struct EditorState {
    buffer: DraftBuffer,
    dirty: bool,
    saving: bool,
    /// Bumped on every edit; a save only cleans the buffer if no edit
    /// landed while it was in flight.
    revision: u64,
    last_saved_at: Option<DateTime<Utc>>,
    timer: DebounceTimer,
}

impl EditorState {
    fn phase(&self) -> Phase {
        if self.saving {
            Phase::Saving
        } else if self.dirty {
            Phase::Dirty
        } else {
            Phase::Clean
        }
    }
}

struct Shared<S, N> {
    store: S,
    notifier: N,
    delay: Duration,
    state: Mutex<EditorState>,
}

/// Handle to one editor. Clones refer to the same buffer.
///
/// Edits spawn timer tasks, so an editor must be used inside a Tokio runtime.
pub struct Editor<S, N> {
    shared: Arc<Shared<S, N>>,
}

impl<S, N> Clone for Editor<S, N> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<S: SessionStore, N: Notifier> Editor<S, N> {
    /// Editor over an empty, never-saved buffer.
    pub fn new(store: S, notifier: N) -> Self {
        Self::new_with_delay(store, notifier, AUTOSAVE_DELAY)
    }

    /// Like [`Editor::new`] with a custom debounce delay.
    pub fn new_with_delay(store: S, notifier: N, delay: Duration) -> Self {
        Self::with_buffer(store, notifier, DraftBuffer::default(), delay)
    }

    /// Editor over an already persisted record.
    pub fn load(store: S, notifier: N, record: &SessionRecord) -> Self {
        Self::with_buffer(
            store,
            notifier,
            DraftBuffer::from_record(record),
            AUTOSAVE_DELAY,
        )
    }

    fn with_buffer(store: S, notifier: N, buffer: DraftBuffer, delay: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                notifier,
                delay,
                state: Mutex::new(EditorState {
                    buffer,
                    dirty: false,
                    saving: false,
                    revision: 0,
                    last_saved_at: None,
                    timer: DebounceTimer::new(),
                }),
            }),
        }
    }

    // -- Edits --

    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        self.edit(move |b| b.title = title);
    }

    pub fn set_tags_input(&self, tags: impl Into<String>) {
        let tags = tags.into();
        self.edit(move |b| b.tags_input = tags);
    }

    pub fn set_json_file_url(&self, url: impl Into<String>) {
        let url = url.into();
        self.edit(move |b| b.json_file_url = url);
    }

    fn edit(&self, apply: impl FnOnce(&mut DraftBuffer)) {
        let mut state = self.shared.lock();
        apply(&mut state.buffer);
        state.dirty = true;
        state.revision += 1;

        let generation = state.revision;
        let weak: Weak<Shared<S, N>> = Arc::downgrade(&self.shared);
        state.timer.schedule(self.shared.delay, async move {
            if let Some(shared) = weak.upgrade() {
                Shared::autosave(shared, generation).await;
            }
        });
    }

    // -- Commands --

    /// Save as draft now, regardless of the timer or an empty buffer.
    pub async fn save_draft(&self) -> Result<SessionRecord, EditorError> {
        let (payload, revision) = self.shared.begin_explicit(SaveKind::Draft)?;
        self.run(SaveKind::Draft, payload, revision).await
    }

    /// Validate locally, then save with status published.
    ///
    /// Validation failures never reach the store.
    pub async fn publish(&self) -> Result<SessionRecord, EditorError> {
        let (payload, revision) = match self.shared.begin_explicit(SaveKind::Publish) {
            Err(EditorError::Validation(errors)) => {
                for e in &errors {
                    self.shared.notifier.notify(NoticeKind::Error, &e.message);
                }
                debug!("Publish rejected locally: {} field(s)", errors.len());
                return Err(EditorError::Validation(errors));
            }
            started => started?,
        };
        self.run(SaveKind::Publish, payload, revision).await
    }

    /// Stop auto-saving, e.g. when the user navigates away. Warns through
    /// the notifier if there are unsaved changes. A save already in flight
    /// is left to finish.
    pub fn close(&self) -> CloseOutcome {
        let outcome = {
            let mut state = self.shared.lock();
            state.timer.cancel();
            CloseOutcome {
                unsaved_changes: state.dirty,
                save_in_flight: state.saving,
            }
        };
        if outcome.unsaved_changes {
            self.shared
                .notifier
                .notify(NoticeKind::Warning, "You have unsaved changes");
        }
        outcome
    }

    // -- Observers --

    pub fn snapshot(&self) -> EditorSnapshot {
        let state = self.shared.lock();
        EditorSnapshot {
            buffer: state.buffer.clone(),
            phase: state.phase(),
            last_saved_at: state.last_saved_at,
            autosave_pending: state.timer.is_pending(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.shared.lock().phase()
    }

    pub fn is_dirty(&self) -> bool {
        self.shared.lock().dirty
    }

    /// The save runs in its own task so dropping this future does not
    /// abort it.
    async fn run(
        &self,
        kind: SaveKind,
        payload: SessionPayload,
        revision: u64,
    ) -> Result<SessionRecord, EditorError> {
        let shared = self.shared.clone();
        tokio::spawn(Shared::persist(shared, kind, payload, revision))
            .await
            .map_err(|e| {
                warn!("Save task failed to complete: {}", e);
                EditorError::Interrupted
            })?
            .map_err(EditorError::from)
    }
}

impl<S: SessionStore, N: Notifier> Shared<S, N> {
    fn lock(&self) -> MutexGuard<'_, EditorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enter `Saving` for an explicit request, cancelling any pending autosave.
    /// A publish is validated against the same buffer it sends; a rejected
    /// one leaves the editor untouched.
    fn begin_explicit(&self, kind: SaveKind) -> Result<(SessionPayload, u64), EditorError> {
        let mut state = self.lock();
        if kind == SaveKind::Publish {
            check_publishable(&state.buffer.title, &state.buffer.json_file_url)
                .map_err(EditorError::Validation)?;
        }
        if state.saving {
            debug!("Explicit save refused: another save is in flight");
            return Err(EditorError::SaveInFlight);
        }
        state.timer.cancel();
        state.saving = true;
        Ok((state.buffer.to_payload(), state.revision))
    }

    /// Timer callback. Does nothing if superseded by a newer edit, if the
    /// buffer is empty or clean, or if another save is in flight.
    async fn autosave(shared: Arc<Self>, generation: u64) {
        let (payload, revision) = {
            let mut state = shared.lock();
            if state.revision != generation {
                return;
            }
            state.timer.detach();
            if !state.dirty {
                return;
            }
            if state.buffer.is_empty() {
                debug!("Autosave skipped: buffer is empty");
                return;
            }
            if state.saving {
                debug!("Autosave skipped: a save is in flight");
                return;
            }
            state.saving = true;
            (state.buffer.to_payload(), state.revision)
        };

        let _ = Self::persist(shared, SaveKind::Auto, payload, revision).await;
    }

    async fn persist(
        shared: Arc<Self>,
        kind: SaveKind,
        payload: SessionPayload,
        revision: u64,
    ) -> Result<SessionRecord, StoreError> {
        debug!(?kind, id = ?payload.id, "Saving session");
        let result = match kind {
            SaveKind::Auto | SaveKind::Draft => shared.store.persist_draft(payload).await,
            SaveKind::Publish => shared.store.persist_published(payload).await,
        };

        {
            let mut state = shared.lock();
            state.saving = false;
            match &result {
                Ok(record) => {
                    if state.buffer.id.is_none() {
                        state.buffer.id = Some(record.id);
                    }
                    state.last_saved_at = Some(Utc::now());
                    if state.revision == revision {
                        state.dirty = false;
                    }
                }
                Err(_) => state.dirty = true,
            }
        }

        match (&result, kind) {
            (Ok(_), SaveKind::Auto) => shared.notifier.notify(NoticeKind::Info, "Draft auto-saved"),
            (Ok(_), SaveKind::Draft) => shared.notifier.notify(NoticeKind::Success, "Draft saved"),
            (Ok(_), SaveKind::Publish) => {
                shared.notifier.notify(NoticeKind::Success, "Session published")
            }
            (Err(e), SaveKind::Auto) => {
                warn!("Autosave failed: {}", e);
                shared
                    .notifier
                    .notify(NoticeKind::Error, &format!("Auto-save failed: {}", e));
            }
            (Err(e), _) => {
                warn!("Save failed: {}", e);
                shared
                    .notifier
                    .notify(NoticeKind::Error, &format!("Save failed: {}", e));
            }
        }

        result
    }
}
