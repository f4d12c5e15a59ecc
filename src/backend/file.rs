//! Session records persisted as a JSON map on disk.
//!
//! Used by the CLI so a session written in one process is visible to the
//! next. The whole map is re-read on every call; the file is the source of
//! truth, not an in-process cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{upsert_session, BackendError, SessionRepository};
use crate::types::{ActorId, SessionRecord, SessionUpdate};

const SESSIONS_FILE: &str = "sessions.json";

pub struct JsonFileSessions {
    path: PathBuf,
    /// Serializes read-modify-write cycles from this process
    write_lock: Mutex<()>,
}

impl JsonFileSessions {
    /// Store sessions under `state_dir/sessions.json`.
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join(SESSIONS_FILE),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<ActorId, SessionRecord>, BackendError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, sessions: &HashMap<ActorId, SessionRecord>) -> Result<(), BackendError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(sessions)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for JsonFileSessions {
    async fn get_session_record(
        &self,
        actor: &ActorId,
    ) -> Result<Option<SessionRecord>, BackendError> {
        let mut sessions = self.load().await?;
        Ok(sessions.remove(actor))
    }

    async fn upsert_session_record(
        &self,
        actor: &ActorId,
        update: SessionUpdate,
    ) -> Result<SessionRecord, BackendError> {
        let _guard = self.write_lock.lock().await;
        let mut sessions = self.load().await?;
        let record = upsert_session(&mut sessions, actor, update);
        self.save(&sessions).await?;
        Ok(record)
    }
}
