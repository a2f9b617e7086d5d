//! Session persistence.
//!
//! Handlers never keep sessions in memory between events. Every event loads
//! the record from a [`SessionStore`], and every accepted event writes it
//! back before returning.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;

use super::error::StoreError;
use super::session::{SessionKey, VerificationSession};

/// Key-value storage for verification sessions.
pub trait SessionStore: Send + Sync {
    /// Load a session. A missing key is `Ok(None)`.
    fn load(&self, key: &SessionKey) -> Result<Option<VerificationSession>, StoreError>;

    /// Insert or replace a session.
    fn save(&self, session: &VerificationSession) -> Result<(), StoreError>;

    /// Remove a session. Returns whether it existed.
    fn delete(&self, key: &SessionKey) -> Result<bool, StoreError>;

    /// Keys of all stored sessions, sorted.
    fn keys(&self) -> Result<Vec<SessionKey>, StoreError>;
}

/// Stores each session as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the session files.
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path_for(&self, key: &SessionKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, key: &SessionKey) -> Result<Option<VerificationSession>, StoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let session: VerificationSession = serde_json::from_str(&content)?;
        Ok(Some(session))
    }

    fn save(&self, session: &VerificationSession) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(session)?;

        // The previous record stays in place until the rename.
        let path = self.path_for(&session.key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, key: &SessionKey) -> Result<bool, StoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }

    fn keys(&self) -> Result<Vec<SessionKey>, StoreError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut keys: Vec<SessionKey> = fs::read_dir(&self.dir)?
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                name.strip_suffix(".json").map(SessionKey::from_raw)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// In-memory store, used in tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionKey, VerificationSession>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, key: &SessionKey) -> Result<Option<VerificationSession>, StoreError> {
        Ok(self.sessions.lock().get(key).cloned())
    }

    fn save(&self, session: &VerificationSession) -> Result<(), StoreError> {
        self.sessions.lock().insert(session.key.clone(), session.clone());
        Ok(())
    }

    fn delete(&self, key: &SessionKey) -> Result<bool, StoreError> {
        Ok(self.sessions.lock().remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<SessionKey>, StoreError> {
        let mut keys: Vec<SessionKey> = self.sessions.lock().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

impl<T: SessionStore + ?Sized> SessionStore for &T {
    fn load(&self, key: &SessionKey) -> Result<Option<VerificationSession>, StoreError> {
        (**self).load(key)
    }

    fn save(&self, session: &VerificationSession) -> Result<(), StoreError> {
        (**self).save(session)
    }

    fn delete(&self, key: &SessionKey) -> Result<bool, StoreError> {
        (**self).delete(key)
    }

    fn keys(&self) -> Result<Vec<SessionKey>, StoreError> {
        (**self).keys()
    }
}
