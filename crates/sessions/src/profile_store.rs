//! Profile store: the `(namespace, user_id, key)` half of the Persistence
//! Adapter (§4.4). Each entry is an opaque JSON object with a single
//! `memory: text` field.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::session_key::is_valid_identifier;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub memory: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProfileStoreError {
    #[error("invalid user_id: must match ^[A-Za-z0-9_-]{{1,64}}$")]
    InvalidUserId,
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ProfileStoreError {
    fn from(e: std::io::Error) -> Self {
        ProfileStoreError::Io(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn setup(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    fn path_for(&self, namespace: &str, user_id: &str, key: &str) -> PathBuf {
        self.dir.join(namespace).join(user_id).join(format!("{key}.json"))
    }

    pub fn get(&self, namespace: &str, user_id: &str, key: &str) -> Result<Option<ProfileEntry>, ProfileStoreError> {
        if !is_valid_identifier(user_id) {
            return Err(ProfileStoreError::InvalidUserId);
        }
        let path = self.path_for(namespace, user_id, key);
        match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let entry = serde_json::from_str(&raw)
                    .map_err(|e| ProfileStoreError::Io(e.to_string()))?;
                Ok(Some(entry))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn put(&self, namespace: &str, user_id: &str, key: &str, entry: &ProfileEntry) -> Result<(), ProfileStoreError> {
        if !is_valid_identifier(user_id) {
            return Err(ProfileStoreError::InvalidUserId);
        }
        let path = self.path_for(namespace, user_id, key);
        let bytes = serde_json::to_vec_pretty(entry).map_err(|e| ProfileStoreError::Io(e.to_string()))?;
        write_atomic(&path, &bytes)?;
        Ok(())
    }

    pub fn delete(&self, namespace: &str, user_id: &str, key: &str) -> Result<(), ProfileStoreError> {
        if !is_valid_identifier(user_id) {
            return Err(ProfileStoreError::InvalidUserId);
        }
        match std::fs::remove_file(self.path_for(namespace, user_id, key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    std::io::Write::write_all(&mut tmp, contents)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_user_id_with_invalid_characters() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());
        store.setup().unwrap();
        let entry = ProfileEntry { memory: "[]".into() };
        let err = store.put("default", "../etc", "profile", &entry).unwrap_err();
        assert!(matches!(err, ProfileStoreError::InvalidUserId));
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());
        store.setup().unwrap();
        let entry = ProfileEntry { memory: "- likes rust".into() };
        store.put("default", "u1", "profile", &entry).unwrap();

        let loaded = store.get("default", "u1", "profile").unwrap().unwrap();
        assert_eq!(loaded.memory, "- likes rust");
    }

    #[test]
    fn get_of_missing_entry_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());
        store.setup().unwrap();
        assert!(store.get("default", "u1", "profile").unwrap().is_none());
    }

    #[test]
    fn delete_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());
        store.setup().unwrap();
        let entry = ProfileEntry { memory: "x".into() };
        store.put("default", "u1", "profile", &entry).unwrap();
        store.delete("default", "u1", "profile").unwrap();
        assert!(store.get("default", "u1", "profile").unwrap().is_none());
    }
}
