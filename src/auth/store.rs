// Allow dead code: session surface is wider than any single consumer
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use tracing::debug;

use super::session::Session;

/// Storage key for the serialized session.
const KEY_SESSION: &str = "session";

/// Storage key for the numeric expiry timestamp, kept alongside the session
/// so a glance at storage answers "when does this expire" without parsing
/// the full record.
const KEY_EXPIRES_AT: &str = "expires_at";

/// Durable key/value storage for session state.
///
/// Pluggable so the session manager can be exercised in tests without
/// touching the filesystem.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// One file per key under a directory, typically the platform data dir.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create storage directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Some(contents))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path(key);
        std::fs::write(&path, value)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

/// In-memory storage. Cloning shares the underlying map, which lets tests
/// seed or inspect state behind a manager's back.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Serialization layer between `Session` and the two storage entries.
pub struct SessionStore {
    storage: Box<dyn KeyValueStorage>,
}

impl SessionStore {
    pub fn new(storage: Box<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// Load the persisted session.
    ///
    /// `Ok(None)` means nothing is persisted. Any unreadable, unparseable,
    /// or partial record is an error; callers treat that as "absent" after
    /// clearing storage.
    pub fn load(&self) -> Result<Option<Session>> {
        let session_raw = self.storage.get(KEY_SESSION)?;
        let expiry_raw = self.storage.get(KEY_EXPIRES_AT)?;

        let (session_raw, expiry_raw) = match (session_raw, expiry_raw) {
            (None, None) => return Ok(None),
            (Some(s), Some(e)) => (s, e),
            // One entry without the other is a partial write, not a session
            _ => bail!("partial session record in storage"),
        };

        let session: Session =
            serde_json::from_str(&session_raw).context("failed to parse persisted session")?;
        let expires_at: i64 = expiry_raw
            .trim()
            .parse()
            .context("failed to parse persisted expiry timestamp")?;
        if expires_at != session.expires_at {
            bail!("persisted expiry does not match session record");
        }

        Ok(Some(session))
    }

    /// Persist the session. Called synchronously after every state
    /// transition that produces a new session.
    pub fn save(&self, session: &Session) -> Result<()> {
        let serialized =
            serde_json::to_string(session).context("failed to serialize session")?;
        self.storage.set(KEY_SESSION, &serialized)?;
        self.storage
            .set(KEY_EXPIRES_AT, &session.expires_at.to_string())?;
        debug!(expires_at = session.expires_at, "session persisted");
        Ok(())
    }

    /// Remove both entries. Idempotent.
    pub fn clear(&self) -> Result<()> {
        self.storage.remove(KEY_SESSION)?;
        self.storage.remove(KEY_EXPIRES_AT)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::AuthUser;

    fn sample_session() -> Session {
        let user = AuthUser {
            id: 7,
            username: "emilys".to_string(),
            email: "emily@example.com".to_string(),
            image: "https://example.com/emily.png".to_string(),
            token: "tok-123".to_string(),
        };
        Session::issue(user, 1_000_000)
    }

    fn memory_store() -> (MemoryStorage, SessionStore) {
        let storage = MemoryStorage::new();
        let store = SessionStore::new(Box::new(storage.clone()));
        (storage, store)
    }

    #[test]
    fn test_load_absent() {
        let (_, store) = memory_store();
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let (_, store) = memory_store();
        let session = sample_session();
        store.save(&session).expect("save");

        let loaded = store.load().expect("load").expect("session present");
        assert_eq!(loaded, session);
    }

    #[test]
    fn test_save_writes_both_entries() {
        let (storage, store) = memory_store();
        let session = sample_session();
        store.save(&session).expect("save");

        let expiry = storage.get(KEY_EXPIRES_AT).expect("get").expect("expiry");
        assert_eq!(expiry, session.expires_at.to_string());
        assert!(storage.get(KEY_SESSION).expect("get").is_some());
    }

    #[test]
    fn test_corrupted_session_is_an_error() {
        let (storage, store) = memory_store();
        storage.set(KEY_SESSION, "{not json").expect("set");
        storage.set(KEY_EXPIRES_AT, "12345").expect("set");
        assert!(store.load().is_err());
    }

    #[test]
    fn test_partial_record_is_an_error() {
        let (storage, store) = memory_store();
        storage.set(KEY_EXPIRES_AT, "12345").expect("set");
        assert!(store.load().is_err());
    }

    #[test]
    fn test_mismatched_expiry_is_an_error() {
        let (storage, store) = memory_store();
        let session = sample_session();
        store.save(&session).expect("save");
        storage.set(KEY_EXPIRES_AT, "999").expect("set");
        assert!(store.load().is_err());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (_, store) = memory_store();
        store.save(&sample_session()).expect("save");
        store.clear().expect("first clear");
        store.clear().expect("second clear");
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path().to_path_buf()).expect("storage");
        let store = SessionStore::new(Box::new(storage));

        let session = sample_session();
        store.save(&session).expect("save");
        let loaded = store.load().expect("load").expect("session present");
        assert_eq!(loaded, session);

        store.clear().expect("clear");
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn test_file_storage_corrupted_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(KEY_SESSION), "garbage").expect("write");
        std::fs::write(dir.path().join(KEY_EXPIRES_AT), "also garbage").expect("write");

        let storage = FileStorage::new(dir.path().to_path_buf()).expect("storage");
        let store = SessionStore::new(Box::new(storage));
        assert!(store.load().is_err());
    }
}
