//! Client side of the wellness sessions service: an explicit auth session,
//! a REST client, and the auto-saving session editor.

pub mod client;
pub mod debounce;
pub mod editor;
pub mod error;
pub mod notify;
pub mod session;

pub use client::{ApiClient, PublishedQuery};
pub use editor::{
    AUTOSAVE_DELAY, CloseOutcome, DraftBuffer, Editor, EditorSnapshot, Phase, SessionStore,
};
pub use error::{EditorError, StoreError};
pub use notify::{NoticeKind, Notifier, TracingNotifier};
pub use session::{AuthSession, FileTokenStorage, MemoryTokenStorage, StoredAuth, TokenStorage};
