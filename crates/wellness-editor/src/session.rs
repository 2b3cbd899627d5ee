//! Explicit auth session passed to whatever needs the current user.
//!
//! Nothing here is global: callers build an [`AuthSession`] over some
//! [`TokenStorage`], call [`AuthSession::init_from_storage`] at startup and
//! [`AuthSession::teardown`] on logout or when the server rejects the token.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use wellness_types::models::User;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAuth {
    pub token: String,
    pub user: User,
}

/// Where a signed-in session survives restarts.
pub trait TokenStorage: Send + Sync {
    fn load(&self) -> anyhow::Result<Option<StoredAuth>>;
    fn save(&self, auth: &StoredAuth) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

/// JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> anyhow::Result<Option<StoredAuth>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };
        let auth = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(Some(auth))
    }

    fn save(&self, auth: &StoredAuth) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(auth)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", self.path.display())),
        }
    }
}

/// Process-local storage; nothing outlives the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    slot: Mutex<Option<StoredAuth>>,
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> anyhow::Result<Option<StoredAuth>> {
        Ok(self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, auth: &StoredAuth) -> anyhow::Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(auth.clone());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// The signed-in user and their bearer token, if any. Cheap to clone;
/// clones share state.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<AuthSessionInner>,
}

struct AuthSessionInner {
    storage: Box<dyn TokenStorage>,
    current: RwLock<Option<StoredAuth>>,
}

impl AuthSession {
    /// Starts signed out; call [`Self::init_from_storage`] to pick up a
    /// previous login.
    pub fn new(storage: impl TokenStorage + 'static) -> Self {
        Self {
            inner: Arc::new(AuthSessionInner {
                storage: Box::new(storage),
                current: RwLock::new(None),
            }),
        }
    }

    /// Load a persisted login. Returns whether one was found.
    pub fn init_from_storage(&self) -> anyhow::Result<bool> {
        let loaded = self.inner.storage.load()?;
        let found = loaded.is_some();
        if let Some(auth) = &loaded {
            debug!("Restored session for {}", auth.user.email);
        }
        *self.write() = loaded;
        Ok(found)
    }

    /// Record a fresh login and persist it.
    pub fn establish(&self, auth: StoredAuth) -> anyhow::Result<()> {
        self.inner.storage.save(&auth)?;
        info!("Signed in as {}", auth.user.email);
        *self.write() = Some(auth);
        Ok(())
    }

    /// Forget the current login, in memory and in storage.
    pub fn teardown(&self) -> anyhow::Result<()> {
        if let Some(auth) = self.write().take() {
            info!("Signed out {}", auth.user.email);
        }
        self.inner.storage.clear()
    }

    pub fn token(&self) -> Option<String> {
        self.read().as_ref().map(|a| a.token.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.read().as_ref().map(|a| a.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<StoredAuth>> {
        self.inner.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<StoredAuth>> {
        self.inner.current.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_auth() -> StoredAuth {
        StoredAuth {
            token: "tok".to_string(),
            user: User {
                id: Uuid::new_v4(),
                email: "ana@example.com".to_string(),
                created_at: chrono::Utc::now(),
                last_login: None,
            },
        }
    }

    #[test]
    fn lifecycle_with_memory_storage() {
        let session = AuthSession::new(MemoryTokenStorage::default());
        assert!(!session.init_from_storage().unwrap());
        assert!(!session.is_authenticated());

        let auth = sample_auth();
        session.establish(auth.clone()).unwrap();
        assert_eq!(session.token().as_deref(), Some("tok"));
        assert_eq!(session.user(), Some(auth.user));

        session.teardown().unwrap();
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
        assert!(!session.init_from_storage().unwrap());
    }

    #[test]
    fn file_storage_survives_new_session() {
        let dir = std::env::temp_dir().join(format!("wellness_session_test_{}", Uuid::new_v4()));
        let path = dir.join("auth.json");

        let first = AuthSession::new(FileTokenStorage::new(&path));
        first.establish(sample_auth()).unwrap();

        let second = AuthSession::new(FileTokenStorage::new(&path));
        assert!(second.init_from_storage().unwrap());
        assert_eq!(second.token().as_deref(), Some("tok"));

        second.teardown().unwrap();
        assert!(!path.exists());
        // clearing twice is fine
        second.teardown().unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }
}
