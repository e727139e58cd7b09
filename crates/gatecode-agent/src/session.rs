//! In-memory session state, backed by the durable [`SessionStore`] (spec
//! §4.6). A `Session` is the unit the Agent Runner turns against: the live
//! message history plus enough bookkeeping (model, abort channel) to run a
//! turn. History here is append-only — the store's own invariant ("forking
//! is the only operation that may prune history, and only in the new
//! clone") holds at this layer too; context-budget compaction happens on an
//! ephemeral copy built for the next LLM request, not on this history.

use crate::context::ContextManager;
use crate::store::{project_hash, SessionEvent, SessionStore};
use dashmap::DashMap;
use gatecode_core::{Message, Result, SessionKey};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::info;

/// One live session: message history plus a cooperative-cancellation
/// channel for the run currently using it, if any.
pub struct Session {
    pub key: SessionKey,
    store: Arc<dyn SessionStore>,
    messages: RwLock<Vec<Message>>,
    model: RwLock<String>,
    abort_tx: mpsc::Sender<()>,
    abort_rx: RwLock<Option<mpsc::Receiver<()>>>,
    agent: RwLock<Option<String>>,
    agents: RwLock<Option<serde_json::Value>>,
}

impl Session {
    fn new(key: SessionKey, store: Arc<dyn SessionStore>, model: String) -> Self {
        let (abort_tx, abort_rx) = mpsc::channel(1);
        Self {
            key,
            store,
            messages: RwLock::new(Vec::new()),
            model: RwLock::new(model),
            abort_tx,
            abort_rx: RwLock::new(Some(abort_rx)),
            agent: RwLock::new(None),
            agents: RwLock::new(None),
        }
    }

    /// Appends a message to in-memory history and durably persists it as
    /// its own event. Every tool result is its own message — unlike the
    /// Anthropic content-block shape this runtime replaces, nothing here
    /// merges multiple tool results into a single turn.
    pub async fn append(&self, message: Message) -> Result<()> {
        self.store
            .append_event(&self.key, &SessionEvent::Message(message.clone()))
            .await?;
        self.messages.write().await.push(message);
        Ok(())
    }

    /// Sets or extends the leading system message. Per spec §9: if a
    /// system message is already first, the new prompt concatenates onto
    /// it rather than replacing it — callers should expect `run` to grow
    /// the first message's content across turns.
    pub async fn set_system(&self, content: impl Into<String>) -> Result<()> {
        let content = content.into();
        let mut messages = self.messages.write().await;
        let message = if let Some(first) = messages.first() {
            if matches!(first.role, gatecode_core::Role::System) {
                Message::system(format!("{}\n\n{}", first.content, content))
            } else {
                Message::system(content)
            }
        } else {
            Message::system(content)
        };

        self.store
            .append_event(&self.key, &SessionEvent::Message(message.clone()))
            .await?;
        if messages.first().is_some_and(|m| matches!(m.role, gatecode_core::Role::System)) {
            messages[0] = message;
        } else {
            messages.insert(0, message);
        }
        Ok(())
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

    pub async fn message_count(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn token_count(&self, context: &ContextManager) -> usize {
        let messages = self.messages.read().await;
        context.calculate_core_total(&messages)
    }

    pub async fn model(&self) -> String {
        self.model.read().await.clone()
    }

    pub async fn set_model(&self, model: impl Into<String>) {
        *self.model.write().await = model.into();
    }

    /// Records the `agent` override from an `initialize` control request
    /// (spec §4.4). Bookkeeping only — this runtime has no subagent dispatch
    /// of its own yet, so the override is just held for inspection/replay.
    pub async fn set_agent_override(&self, agent: impl Into<String>) {
        *self.agent.write().await = Some(agent.into());
    }

    pub async fn agent_override(&self) -> Option<String> {
        self.agent.read().await.clone()
    }

    /// Records the `agents` JSON payload from an `initialize` control
    /// request, verbatim.
    pub async fn set_agents(&self, agents: serde_json::Value) {
        *self.agents.write().await = Some(agents);
    }

    pub async fn agents(&self) -> Option<serde_json::Value> {
        self.agents.read().await.clone()
    }

    pub async fn abort(&self) {
        let _ = self.abort_tx.send(()).await;
    }

    pub async fn take_abort_rx(&self) -> Option<mpsc::Receiver<()>> {
        self.abort_rx.write().await.take()
    }
}

/// Registry of live sessions, indexed by [`SessionKey`], backed by a shared
/// [`SessionStore`] for durability and project-scoped resume.
pub struct SessionRegistry {
    sessions: DashMap<SessionKey, Arc<Session>>,
    store: Arc<dyn SessionStore>,
    default_model: String,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn SessionStore>, default_model: impl Into<String>) -> Self {
        Self {
            sessions: DashMap::new(),
            store,
            default_model: default_model.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Creates a brand-new session with a fresh UUID.
    pub fn create(&self) -> Arc<Session> {
        self.create_with_key(SessionKey::generate())
    }

    /// Creates a brand-new session under a caller-assigned key (spec §6.5:
    /// `--session-id` on a fresh run, not a resume/fork).
    pub fn create_with_key(&self, key: SessionKey) -> Arc<Session> {
        let session = Arc::new(Session::new(key.clone(), self.store.clone(), self.default_model.clone()));
        self.sessions.insert(key.clone(), session.clone());
        info!("session {} created", key);
        session
    }

    pub fn get(&self, key: &SessionKey) -> Option<Arc<Session>> {
        self.sessions.get(key).map(|s| s.clone())
    }

    pub fn remove(&self, key: &SessionKey) {
        self.sessions.remove(key);
    }

    pub fn list(&self) -> Vec<SessionKey> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Rehydrates a session's in-memory history from the durable event log
    /// (`--resume <id>`/`--continue`). Registers the live handle under the
    /// same key so subsequent turns append to the same log.
    pub async fn resume(&self, key: SessionKey) -> Result<Arc<Session>> {
        let events = self.store.load_events(&key).await?;
        let session = Arc::new(Session::new(key.clone(), self.store.clone(), self.default_model.clone()));
        {
            let mut messages = session.messages.write().await;
            for event in events {
                let SessionEvent::Message(message) = event else {
                    continue;
                };
                // Each `set_system` call persists the full, re-concatenated
                // system message rather than a diff, so the latest one on
                // replay simply replaces the running leading entry.
                if matches!(message.role, gatecode_core::Role::System)
                    && messages.first().is_some_and(|m| matches!(m.role, gatecode_core::Role::System))
                {
                    messages[0] = message;
                } else {
                    messages.push(message);
                }
            }
        }
        info!("session {} resumed ({} messages)", key, session.message_count().await);
        self.sessions.insert(key, session.clone());
        Ok(session)
    }

    /// Resolves `--continue`: the most recently used session for the given
    /// project root, if one exists.
    pub async fn resume_last_for_project(&self, project_root: &Path) -> Result<Option<Arc<Session>>> {
        let hash = project_hash(project_root);
        match self.store.load_last_session(&hash).await? {
            Some(key) => Ok(Some(self.resume(key).await?)),
            None => Ok(None),
        }
    }

    pub async fn record_last_for_project(&self, project_root: &Path, key: &SessionKey) -> Result<()> {
        let hash = project_hash(project_root);
        self.store.save_last_session(&hash, key).await
    }

    /// Forks `source` at `keep` events (spec S6): the clone gets a fresh
    /// session id (or the caller-assigned `target_key`, for `--session-id`
    /// combined with `--resume`/`--continue`) and sees only the first `keep`
    /// persisted events. The source session on disk is untouched.
    pub async fn fork(&self, source: &SessionKey, keep: usize, target_key: Option<SessionKey>) -> Result<Arc<Session>> {
        let target = target_key.unwrap_or_else(SessionKey::generate);
        self.store.clone_session(source, &target, Some(keep)).await?;
        self.resume(target).await
    }

    pub async fn list_recent(&self, limit: usize) -> Result<Vec<SessionKey>> {
        self.store.list_sessions(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemorySessionStore;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(InMemorySessionStore::new()), "gpt-4o")
    }

    #[tokio::test]
    async fn create_then_append_persists_each_message_separately() {
        let registry = registry();
        let session = registry.create();
        session.append(Message::user("hi")).await.unwrap();
        session.append(Message::assistant("hello")).await.unwrap();
        assert_eq!(session.message_count().await, 2);

        let events = registry.store().load_events(&session.key).await.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn tool_results_are_not_merged_into_one_user_message() {
        let registry = registry();
        let session = registry.create();
        session.append(Message::tool_result("call-1", "result a")).await.unwrap();
        session.append(Message::tool_result("call-2", "result b")).await.unwrap();

        let messages = session.messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(messages[1].tool_call_id.as_deref(), Some("call-2"));
    }

    #[tokio::test]
    async fn resume_rehydrates_history_from_the_store() {
        let registry = registry();
        let session = registry.create();
        session.append(Message::user("A")).await.unwrap();
        session.append(Message::assistant("B")).await.unwrap();
        let key = session.key.clone();
        registry.remove(&key);

        let resumed = registry.resume(key).await.unwrap();
        assert_eq!(resumed.message_count().await, 2);
    }

    #[tokio::test]
    async fn fork_truncates_the_clone_but_leaves_the_source_untouched() {
        let registry = registry();
        let source = registry.create();
        source.append(Message::system("sys")).await.unwrap();
        source.append(Message::user("A")).await.unwrap();
        source.append(Message::assistant("B")).await.unwrap();
        source.append(Message::user("C")).await.unwrap();

        let forked = registry.fork(&source.key, 2, None).await.unwrap();
        assert_eq!(forked.message_count().await, 2);

        forked.append(Message::user("A2")).await.unwrap();
        forked.append(Message::assistant("D")).await.unwrap();
        assert_eq!(forked.message_count().await, 4);

        let source_events = registry.store().load_events(&source.key).await.unwrap();
        assert_eq!(source_events.len(), 4);
    }

    #[tokio::test]
    async fn resume_last_for_project_finds_the_recorded_session() {
        let registry = registry();
        let dir = tempfile::TempDir::new().unwrap();
        let session = registry.create();
        session.append(Message::user("hi")).await.unwrap();
        registry.record_last_for_project(dir.path(), &session.key).await.unwrap();
        registry.remove(&session.key);

        let resumed = registry
            .resume_last_for_project(dir.path())
            .await
            .unwrap()
            .expect("a last session should be recorded");
        assert_eq!(resumed.key.as_str(), session.key.as_str());
    }

    #[tokio::test]
    async fn synthetic_system_prompt_concatenates_onto_an_existing_leading_system_message() {
        let registry = registry();
        let session = registry.create();
        session.set_system("first").await.unwrap();
        session.set_system("second").await.unwrap();
        let messages = session.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "first\n\nsecond");
    }
}
