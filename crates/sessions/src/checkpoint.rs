//! Checkpoint store: the `ConversationState` half of the Persistence
//! Adapter (§4.4). One file per `thread_id`, written atomically at every
//! stage transition, read once at the start of every RPC.

use std::path::{Path, PathBuf};

use agentd_domain::state::ConversationState;

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Idempotent: safe to call on every startup.
    pub fn setup(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    fn path_for(&self, thread_id: &str) -> PathBuf {
        self.dir.join(format!("{thread_id}.json"))
    }

    pub fn load(&self, thread_id: &str) -> std::io::Result<Option<ConversationState>> {
        let path = self.path_for(thread_id);
        match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let state = serde_json::from_str(&raw).map_err(|e| {
                    std::io::Error::new(std::io::ErrorKind::InvalidData, e)
                })?;
                Ok(Some(state))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write-to-temp-then-rename so a crash mid-write can never leave a
    /// torn checkpoint behind; a stage transition either durably lands or
    /// the previous checkpoint is what gets read back. Returns the number
    /// of bytes written, for callers that log checkpoint size.
    pub fn save(&self, thread_id: &str, state: &ConversationState) -> std::io::Result<usize> {
        let path = self.path_for(thread_id);
        let bytes = serde_json::to_vec_pretty(state).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e)
        })?;
        write_atomic(&path, &bytes)?;
        Ok(bytes.len())
    }

    pub fn delete(&self, thread_id: &str) -> std::io::Result<()> {
        match std::fs::remove_file(self.path_for(thread_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
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
    fn load_of_missing_thread_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.setup().unwrap();
        assert!(store.load("absent").unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.setup().unwrap();

        let mut state = ConversationState::default();
        state.messages.push(agentd_domain::message::Message::user("hi"));

        store.save("t1", &state).unwrap();
        let loaded = store.load("t1").unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
    }

    #[test]
    fn save_overwrites_previous_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.setup().unwrap();

        let mut first = ConversationState::default();
        first.loop_count = 1;
        store.save("t1", &first).unwrap();

        let mut second = ConversationState::default();
        second.loop_count = 2;
        store.save("t1", &second).unwrap();

        let loaded = store.load("t1").unwrap().unwrap();
        assert_eq!(loaded.loop_count, 2);
    }

    #[test]
    fn delete_of_missing_thread_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.setup().unwrap();
        assert!(store.delete("never-existed").is_ok());
    }

    #[test]
    fn setup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.setup().unwrap();
        store.setup().unwrap();
    }
}
