//! Conversation state across turns.
//!
//! [`SessionStore`] maps session ids to histories. Each session has its own
//! async mutex, held for a whole turn, so two requests for the same session
//! run one after the other while different sessions never wait on each
//! other. The outer map lock is only held for lookups and inserts.
//!
//! [`SessionLog`] optionally appends every turn to
//! `<log_dir>/<session id>.jsonl`.

use celsia_core::message::{Message, Session, SessionId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

/// In-memory session table with a capacity bound.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Exclusive access to a session, created empty on first use.
    pub async fn lock(&self, id: &SessionId) -> OwnedMutexGuard<Session> {
        self.entry(id).lock_owned().await
    }

    /// A copy of the session's current history, if it exists.
    pub async fn snapshot(&self, id: &SessionId) -> Option<Session> {
        let entry = {
            let sessions = self.sessions.read().unwrap_or_else(|p| p.into_inner());
            sessions.get(id).cloned()
        }?;
        let session = entry.lock().await;
        Some(session.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(id)
    }

    fn entry(&self, id: &SessionId) -> Arc<Mutex<Session>> {
        if let Some(entry) = self.sessions.read().unwrap_or_else(|p| p.into_inner()).get(id) {
            return Arc::clone(entry);
        }

        let mut sessions = self.sessions.write().unwrap_or_else(|p| p.into_inner());
        if let Some(entry) = sessions.get(id) {
            return Arc::clone(entry);
        }
        if sessions.len() >= self.max_sessions {
            evict_oldest_idle(&mut sessions);
        }
        let entry = Arc::new(Mutex::new(Session::new(id.clone())));
        sessions.insert(id.clone(), Arc::clone(&entry));
        entry
    }
}

/// Drop the least recently updated session nobody is using.
fn evict_oldest_idle(sessions: &mut HashMap<SessionId, Arc<Mutex<Session>>>) {
    let oldest = sessions
        .iter()
        .filter_map(|(id, entry)| {
            // A session held by a running turn is not idle.
            let session = entry.try_lock().ok()?;
            Some((id.clone(), session.updated_at))
        })
        .min_by_key(|(_, updated_at)| *updated_at)
        .map(|(id, _)| id);

    match oldest {
        Some(id) => {
            debug!(session_id = %id, "Evicting least recently used session");
            sessions.remove(&id);
        }
        None => warn!(sessions = sessions.len(), "Session table full and every session is busy"),
    }
}

/// Append-only JSONL transcript, one file per session.
#[derive(Debug, Clone)]
pub struct SessionLog {
    dir: PathBuf,
}

impl SessionLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File for `id`; characters outside `[A-Za-z0-9_-]` become `_`.
    pub fn path_for(&self, id: &SessionId) -> PathBuf {
        let name: String = id
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.jsonl"))
    }

    /// Append `messages`. Failures are logged and swallowed.
    pub async fn append(&self, id: &SessionId, messages: &[Message]) {
        if let Err(e) = self.try_append(id, messages).await {
            warn!(session_id = %id, error = %e, "Failed to write session log");
        }
    }

    async fn try_append(&self, id: &SessionId, messages: &[Message]) -> std::io::Result<()> {
        let mut buf = String::new();
        for message in messages {
            let line = serde_json::to_string(message).map_err(std::io::Error::other)?;
            buf.push_str(&line);
            buf.push('\n');
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(id))
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await
    }

    /// Messages previously logged for `id`. Corrupt lines are skipped.
    pub async fn read(&self, id: &SessionId) -> Vec<Message> {
        let path = self.path_for(id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read session log");
                return Vec::new();
            }
        };

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(n, line)| match serde_json::from_str::<Message>(line) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(path = %path.display(), line = n + 1, error = %e, "Skipping corrupt session log line");
                    None
                }
            })
            .collect()
    }
}
