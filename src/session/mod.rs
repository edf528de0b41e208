use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod store;

pub type SessionId = String;

pub const GREETINGS: [&str; 2] = [
    "Hello! I'm your personal AI fitness coach.",
    "Tell me about your goals, and I'll help you build a plan.",
];

const UNTITLED_PREFIX: &str = "New Chat";
const TITLE_MAX_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: SessionId,
    pub title: String,
    pub created_at: String,
    pub history: Vec<Turn>,
    /// A request is in flight; input stays disabled until the terminal event.
    pub pending: bool,
    /// Display-only buffer for the streamed in-progress reply.
    pub partial: String,
    pub last_error: Option<String>,
}

/// All chat sessions plus which one is visible. Only the UI thread touches
/// this; the streaming task reaches it exclusively through relay events.
pub struct SessionStore {
    sessions: Vec<ChatSession>,
    active: Option<SessionId>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Vec::new(),
            active: None,
        }
    }

    pub fn from_records(records: Vec<store::SessionRecord>) -> Self {
        let mut sessions: Vec<ChatSession> = records
            .into_iter()
            .map(store::SessionRecord::into_session)
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Self {
            sessions,
            active: None,
        }
    }

    /// New session seeded with the greeting turns; becomes the active one.
    pub fn create_chat(&mut self) -> SessionId {
        let id = format!("chat-{}", uuid::Uuid::new_v4());
        let mut session = ChatSession {
            id: id.clone(),
            title: format!("{} {}", UNTITLED_PREFIX, self.sessions.len() + 1),
            created_at: unix_timestamp(),
            history: Vec::new(),
            pending: false,
            partial: String::new(),
            last_error: None,
        };
        for greeting in GREETINGS {
            session.history.push(Turn::assistant(greeting));
        }
        self.sessions.push(session);
        self.activate(&id);
        id
    }

    /// Switch the visible transcript. Never mutates any session's history;
    /// a stale partial from an earlier switch-away is discarded.
    pub fn activate(&mut self, id: &str) {
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) else {
            return;
        };
        session.partial.clear();
        self.active = Some(session.id.clone());
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.as_deref() == Some(id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active(&self) -> Option<&ChatSession> {
        let id = self.active.as_deref()?;
        self.get(id)
    }

    pub fn get(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut ChatSession> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn any_pending(&self) -> bool {
        self.sessions.iter().any(|s| s.pending)
    }

    /// Append the user turn and mark the session pending. The first user
    /// message also titles the session.
    pub fn begin_exchange(&mut self, id: &str, text: &str) {
        let Some(session) = self.get_mut(id) else {
            log::warn!("begin_exchange for unknown session {id}");
            return;
        };
        if session.pending {
            log::warn!("begin_exchange while a request is already in flight for {id}");
            return;
        }
        if session.title.starts_with(UNTITLED_PREFIX) {
            session.title = short_title(text);
        }
        session.history.push(Turn::user(text));
        session.pending = true;
        session.partial.clear();
        session.last_error = None;
    }

    /// Display-only: chunks land in the partial buffer of the active session;
    /// chunks for inactive sessions are dropped.
    pub fn push_chunk(&mut self, id: &str, text: &str) {
        if !self.is_active(id) {
            return;
        }
        if let Some(session) = self.get_mut(id) {
            if session.pending {
                session.partial.push_str(text);
            }
        }
    }

    /// Finalize the exchange with the full assistant reply. Applies to any
    /// session, active or not. Returns false (no-op) when the session has no
    /// request in flight, so a replayed terminal event cannot double-append.
    pub fn complete_exchange(&mut self, id: &str, content: String) -> bool {
        let Some(session) = self.get_mut(id) else {
            log::warn!("completion for unknown session {id}");
            return false;
        };
        if !session.pending {
            log::warn!("completion for session {id} with no request in flight");
            return false;
        }
        session.history.push(Turn::assistant(content));
        session.pending = false;
        session.partial.clear();
        true
    }

    /// Roll the pending user turn back out of history so it is not resent on
    /// retry, and record the error for display. Same no-op guard as
    /// `complete_exchange`.
    pub fn fail_exchange(&mut self, id: &str, message: String) -> bool {
        let Some(session) = self.get_mut(id) else {
            log::warn!("failure for unknown session {id}");
            return false;
        };
        if !session.pending {
            log::warn!("failure for session {id} with no request in flight");
            return false;
        }
        if session.history.last().map(|turn| turn.role) == Some(Role::User) {
            session.history.pop();
        }
        session.pending = false;
        session.partial.clear();
        session.last_error = Some(message);
        true
    }
}

fn unix_timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs().to_string(),
        Err(_) => "0".to_string(),
    }
}

fn short_title(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        return trimmed.to_string();
    }
    let mut short: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
    while short.ends_with(' ') {
        short.pop();
    }
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_chat() -> (SessionStore, SessionId) {
        let mut store = SessionStore::new();
        let id = store.create_chat();
        (store, id)
    }

    fn contents(store: &SessionStore, id: &str) -> Vec<String> {
        store
            .get(id)
            .expect("session should exist")
            .history
            .iter()
            .map(|turn| turn.content.clone())
            .collect()
    }

    #[test]
    fn create_chat_seeds_greetings_and_activates() {
        let (store, id) = store_with_chat();
        let session = store.get(&id).expect("created session should exist");
        assert_eq!(session.history.len(), GREETINGS.len());
        assert!(session.history.iter().all(|turn| turn.role == Role::Assistant));
        assert_eq!(session.title, "New Chat 1");
        assert!(store.is_active(&id));
    }

    #[test]
    fn history_grows_by_two_per_completed_exchange() {
        let (mut store, id) = store_with_chat();
        for round in 0..3 {
            store.begin_exchange(&id, &format!("question {round}"));
            store.push_chunk(&id, "ans");
            assert!(store.complete_exchange(&id, format!("answer {round}")));
        }

        let session = store.get(&id).expect("session should exist");
        assert_eq!(session.history.len(), GREETINGS.len() + 6);
        assert!(!session.pending);
        assert!(session.partial.is_empty());
    }

    #[test]
    fn streamed_exchange_lands_in_history_in_order() {
        let (mut store, id) = store_with_chat();
        store.begin_exchange(&id, "Hello");
        store.push_chunk(&id, "Hi");
        store.push_chunk(&id, " there");
        assert_eq!(store.get(&id).expect("session").partial, "Hi there");
        assert!(store.complete_exchange(&id, "Hi there".to_string()));

        let session = store.get(&id).expect("session should exist");
        let tail = &session.history[session.history.len() - 2..];
        assert_eq!(tail[0].role, Role::User);
        assert_eq!(tail[0].content, "Hello");
        assert_eq!(tail[1].role, Role::Assistant);
        assert_eq!(tail[1].content, "Hi there");
        assert!(session.partial.is_empty());
    }

    #[test]
    fn failed_exchange_rolls_back_the_user_turn() {
        let (mut store, id) = store_with_chat();
        let before = contents(&store, &id);

        store.begin_exchange(&id, "X");
        assert!(store.fail_exchange(&id, "Ollama error: connection refused".to_string()));

        assert_eq!(contents(&store, &id), before);
        let session = store.get(&id).expect("session should exist");
        assert!(!session.pending);
        assert_eq!(
            session.last_error.as_deref(),
            Some("Ollama error: connection refused")
        );
    }

    #[test]
    fn switching_sessions_never_mutates_history() {
        let mut store = SessionStore::new();
        let first = store.create_chat();
        store.begin_exchange(&first, "only message");
        store.complete_exchange(&first, "noted".to_string());
        let second = store.create_chat();

        let snapshot_first = contents(&store, &first);
        let snapshot_second = contents(&store, &second);

        store.activate(&first);
        store.activate(&second);
        store.activate(&first);

        assert_eq!(contents(&store, &first), snapshot_first);
        assert_eq!(contents(&store, &second), snapshot_second);
    }

    #[test]
    fn chunks_for_inactive_sessions_are_dropped_from_display() {
        let mut store = SessionStore::new();
        let background = store.create_chat();
        store.begin_exchange(&background, "long question");
        let _foreground = store.create_chat();

        store.push_chunk(&background, "ignored");
        assert!(store.get(&background).expect("background").partial.is_empty());

        // Terminal events land in history no matter which session is visible.
        assert!(store.complete_exchange(&background, "full answer".to_string()));
        let session = store.get(&background).expect("background");
        assert_eq!(
            session.history.last().expect("assistant turn").content,
            "full answer"
        );
    }

    #[test]
    fn terminal_events_are_ignored_without_a_pending_request() {
        let (mut store, id) = store_with_chat();
        store.begin_exchange(&id, "Hello");
        assert!(store.complete_exchange(&id, "Hi".to_string()));

        let len = store.get(&id).expect("session").history.len();
        assert!(!store.complete_exchange(&id, "Hi".to_string()));
        assert!(!store.fail_exchange(&id, "late failure".to_string()));
        assert_eq!(store.get(&id).expect("session").history.len(), len);
    }

    #[test]
    fn first_user_message_titles_the_session() {
        let (mut store, id) = store_with_chat();
        store.begin_exchange(&id, "Build me a four day upper lower split");
        assert_eq!(
            store.get(&id).expect("session").title,
            "Build me a four day..."
        );

        store.complete_exchange(&id, "Sure.".to_string());
        store.begin_exchange(&id, "shorter");
        assert_eq!(
            store.get(&id).expect("session").title,
            "Build me a four day..."
        );
    }

    #[test]
    fn activation_clears_a_stale_partial() {
        let mut store = SessionStore::new();
        let first = store.create_chat();
        store.begin_exchange(&first, "question");
        store.push_chunk(&first, "partial text");
        let _second = store.create_chat();

        store.activate(&first);
        assert!(store.get(&first).expect("first").partial.is_empty());
    }
}
