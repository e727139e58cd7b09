//! Session Store (spec §4.6): durable append-only per-session event log plus
//! the auxiliary last-session-by-project index and the parallel stream-json
//! replay log used by the recorder.
//!
//! Layout on disk (spec §6.3): one directory per session under a base dir —
//! `events.jsonl` (internal event log) and `stream.jsonl` (wire-format replay
//! log) — plus `last-session-by-project/<project-hash>` holding the id of the
//! most recently used session for that working directory.

use gatecode_core::{Message, Result, SessionKey, ToolEvent};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One line of a session's event log. Adjacently tagged so that a reader
/// scanning raw JSONL can dispatch on `event` without touching `data`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    Message(Message),
    Tool(ToolEvent),
}

/// Durable per-session storage. Implementations must guarantee: events are
/// line-delimited JSON, ordering within a session is append-insertion order,
/// and forking never mutates the source session.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn append_event(&self, session_id: &SessionKey, event: &SessionEvent) -> Result<()>;

    /// Returns events in append order, silently skipping malformed lines.
    async fn load_events(&self, session_id: &SessionKey) -> Result<Vec<SessionEvent>>;

    /// Copies the entire event log (and stream log) from `source_id` to a
    /// freshly created `target_id`, optionally truncating the copy to the
    /// first `keep` events. The source is never touched.
    async fn clone_session(
        &self,
        source_id: &SessionKey,
        target_id: &SessionKey,
        keep: Option<usize>,
    ) -> Result<()>;

    async fn save_last_session(&self, project_hash: &str, session_id: &SessionKey) -> Result<()>;

    async fn load_last_session(&self, project_hash: &str) -> Result<Option<SessionKey>>;

    /// Most recent N known sessions, newest first, for the resume picker.
    async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionKey>>;

    async fn append_stream_json_line(&self, session_id: &SessionKey, line: &str) -> Result<()>;

    async fn load_stream_json_lines(&self, session_id: &SessionKey) -> Result<Vec<String>>;
}

/// SHA-256 of the canonicalized working directory, used to key the
/// last-session-by-project index. Deliberately does not resolve git
/// worktree common-dirs to a shared root — every worktree gets its own
/// "last session" pointer.
pub fn project_hash(root: &Path) -> String {
    let canonical = root
        .canonicalize()
        .unwrap_or_else(|_| root.to_path_buf());
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Filesystem-backed [`SessionStore`].
pub struct JsonlSessionStore {
    base_dir: PathBuf,
}

impl JsonlSessionStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn session_dir(&self, session_id: &SessionKey) -> PathBuf {
        self.base_dir.join(session_id.as_str())
    }

    fn events_path(&self, session_id: &SessionKey) -> PathBuf {
        self.session_dir(session_id).join("events.jsonl")
    }

    fn stream_path(&self, session_id: &SessionKey) -> PathBuf {
        self.session_dir(session_id).join("stream.jsonl")
    }

    fn last_session_path(&self, project_hash: &str) -> PathBuf {
        self.base_dir.join("last-session-by-project").join(project_hash)
    }

    fn ensure_session_dir(&self, session_id: &SessionKey) -> Result<PathBuf> {
        let dir = self.session_dir(session_id);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn append_line(&self, path: &Path, line: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn read_lines(&self, path: &Path) -> Result<Vec<String>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(raw.lines().map(|l| l.to_string()).collect())
    }
}

#[async_trait::async_trait]
impl SessionStore for JsonlSessionStore {
    async fn append_event(&self, session_id: &SessionKey, event: &SessionEvent) -> Result<()> {
        self.ensure_session_dir(session_id)?;
        let line = serde_json::to_string(event)?;
        self.append_line(&self.events_path(session_id), &line)
    }

    async fn load_events(&self, session_id: &SessionKey) -> Result<Vec<SessionEvent>> {
        let lines = self.read_lines(&self.events_path(session_id))?;
        Ok(lines
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    async fn clone_session(
        &self,
        source_id: &SessionKey,
        target_id: &SessionKey,
        keep: Option<usize>,
    ) -> Result<()> {
        self.ensure_session_dir(target_id)?;

        let events = self.read_lines(&self.events_path(source_id))?;
        let events = match keep {
            Some(n) => events.into_iter().take(n).collect::<Vec<_>>(),
            None => events,
        };
        let events_path = self.events_path(target_id);
        std::fs::write(&events_path, join_lines(&events))?;

        let stream_lines = self.read_lines(&self.stream_path(source_id))?;
        let stream_path = self.stream_path(target_id);
        std::fs::write(&stream_path, join_lines(&stream_lines))?;

        Ok(())
    }

    async fn save_last_session(&self, project_hash: &str, session_id: &SessionKey) -> Result<()> {
        let path = self.last_session_path(project_hash);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, session_id.as_str())?;
        Ok(())
    }

    async fn load_last_session(&self, project_hash: &str) -> Result<Option<SessionKey>> {
        let path = self.last_session_path(project_hash);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)?;
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(SessionKey::new(trimmed)))
        }
    }

    async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionKey>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries: Vec<(std::time::SystemTime, SessionKey)> = Vec::new();
        for entry in std::fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == "last-session-by-project" {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::UNIX_EPOCH);
            entries.push((modified, SessionKey::new(name.to_string())));
        }
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        entries.truncate(limit);
        Ok(entries.into_iter().map(|(_, key)| key).collect())
    }

    async fn append_stream_json_line(&self, session_id: &SessionKey, line: &str) -> Result<()> {
        self.ensure_session_dir(session_id)?;
        self.append_line(&self.stream_path(session_id), line)
    }

    async fn load_stream_json_lines(&self, session_id: &SessionKey) -> Result<Vec<String>> {
        self.read_lines(&self.stream_path(session_id))
    }
}

fn join_lines(lines: &[String]) -> String {
    if lines.is_empty() {
        String::new()
    } else {
        let mut s = lines.join("\n");
        s.push('\n');
        s
    }
}

/// In-memory test double, used by unit tests that don't want filesystem I/O.
#[derive(Default)]
pub struct InMemorySessionStore {
    events: dashmap::DashMap<String, Vec<SessionEvent>>,
    stream: dashmap::DashMap<String, Vec<String>>,
    last_session: dashmap::DashMap<String, SessionKey>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn append_event(&self, session_id: &SessionKey, event: &SessionEvent) -> Result<()> {
        self.events
            .entry(session_id.as_str().to_string())
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn load_events(&self, session_id: &SessionKey) -> Result<Vec<SessionEvent>> {
        Ok(self
            .events
            .get(session_id.as_str())
            .map(|v| v.clone())
            .unwrap_or_default())
    }

    async fn clone_session(
        &self,
        source_id: &SessionKey,
        target_id: &SessionKey,
        keep: Option<usize>,
    ) -> Result<()> {
        let source_events = self
            .events
            .get(source_id.as_str())
            .map(|v| v.clone())
            .unwrap_or_default();
        let kept = match keep {
            Some(n) => source_events.into_iter().take(n).collect(),
            None => source_events,
        };
        self.events.insert(target_id.as_str().to_string(), kept);

        let source_stream = self
            .stream
            .get(source_id.as_str())
            .map(|v| v.clone())
            .unwrap_or_default();
        self.stream
            .insert(target_id.as_str().to_string(), source_stream);
        Ok(())
    }

    async fn save_last_session(&self, project_hash: &str, session_id: &SessionKey) -> Result<()> {
        self.last_session
            .insert(project_hash.to_string(), session_id.clone());
        Ok(())
    }

    async fn load_last_session(&self, project_hash: &str) -> Result<Option<SessionKey>> {
        Ok(self.last_session.get(project_hash).map(|v| v.clone()))
    }

    async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionKey>> {
        let mut keys: Vec<SessionKey> = self
            .events
            .iter()
            .map(|e| SessionKey::new(e.key().clone()))
            .collect();
        keys.truncate(limit);
        Ok(keys)
    }

    async fn append_stream_json_line(&self, session_id: &SessionKey, line: &str) -> Result<()> {
        self.stream
            .entry(session_id.as_str().to_string())
            .or_default()
            .push(line.to_string());
        Ok(())
    }

    async fn load_stream_json_lines(&self, session_id: &SessionKey) -> Result<Vec<String>> {
        Ok(self
            .stream
            .get(session_id.as_str())
            .map(|v| v.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn msg_event(content: &str) -> SessionEvent {
        SessionEvent::Message(Message::user(content))
    }

    #[tokio::test]
    async fn jsonl_store_round_trips_events() {
        let dir = TempDir::new().unwrap();
        let store = JsonlSessionStore::new(dir.path());
        let key = SessionKey::generate();

        store.append_event(&key, &msg_event("hello")).await.unwrap();
        store.append_event(&key, &msg_event("world")).await.unwrap();

        let events = store.load_events(&key).await.unwrap();
        assert_eq!(events.len(), 2);
        match &events[0] {
            SessionEvent::Message(m) => assert_eq!(m.content, "hello"),
            _ => panic!("expected message event"),
        }
    }

    #[tokio::test]
    async fn fork_clones_without_mutating_source() {
        let dir = TempDir::new().unwrap();
        let store = JsonlSessionStore::new(dir.path());
        let source = SessionKey::generate();
        let target = SessionKey::generate();

        store.append_event(&source, &msg_event("A")).await.unwrap();
        store
            .append_event(&source, &SessionEvent::Message(Message::assistant("B")))
            .await
            .unwrap();
        store.append_event(&source, &msg_event("C")).await.unwrap();

        store.clone_session(&source, &target, Some(1)).await.unwrap();

        let forked = store.load_events(&target).await.unwrap();
        assert_eq!(forked.len(), 1);

        let original = store.load_events(&source).await.unwrap();
        assert_eq!(original.len(), 3);
    }

    #[tokio::test]
    async fn last_session_index_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = JsonlSessionStore::new(dir.path());
        let hash = project_hash(dir.path());
        let key = SessionKey::generate();

        assert!(store.load_last_session(&hash).await.unwrap().is_none());
        store.save_last_session(&hash, &key).await.unwrap();
        assert_eq!(
            store.load_last_session(&hash).await.unwrap().unwrap().as_str(),
            key.as_str()
        );
    }

    #[tokio::test]
    async fn list_sessions_reports_known_ids() {
        let dir = TempDir::new().unwrap();
        let store = JsonlSessionStore::new(dir.path());
        let a = SessionKey::generate();
        let b = SessionKey::generate();
        store.append_event(&a, &msg_event("x")).await.unwrap();
        store.append_event(&b, &msg_event("y")).await.unwrap();

        let sessions = store.list_sessions(10).await.unwrap();
        assert_eq!(sessions.len(), 2);
    }

    #[tokio::test]
    async fn project_hash_is_stable_for_the_same_directory() {
        let dir = TempDir::new().unwrap();
        assert_eq!(project_hash(dir.path()), project_hash(dir.path()));
    }

    #[tokio::test]
    async fn in_memory_store_supports_the_same_contract() {
        let store = InMemorySessionStore::new();
        let key = SessionKey::generate();
        store.append_event(&key, &msg_event("hi")).await.unwrap();
        assert_eq!(store.load_events(&key).await.unwrap().len(), 1);
    }
}
