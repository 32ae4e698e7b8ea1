//! Session state and the in-memory session registry.
//!
//! Every uploaded document gets its own session: an id, the document's
//! vector index, the preferred answer language, and the running chat
//! history. The registry holds sessions behind per-session locks so two
//! sessions never contend with each other; the outer map lock is held only
//! long enough to look up or insert an entry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::EngineError;
use crate::index::VectorIndex;
use crate::language::Language;

/// Who said a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of conversation within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Per-document conversation state.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub document_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub language: Language,
    pub chat_history: Vec<ChatMessage>,
    /// The searchable index for this session's document, if one has been
    /// ingested. Swapped wholesale on re-upload.
    pub index: Option<Arc<VectorIndex>>,
}

impl Session {
    fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            document_name: None,
            created_at: now,
            last_active: now,
            language: Language::En,
            chat_history: Vec::new(),
            index: None,
        }
    }
}

/// Lightweight listing entry, cheap to produce for many sessions.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub document_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub message_count: usize,
}

/// Registry of live sessions, keyed by id.
///
/// An optional idle TTL supports [`evict_expired`](Self::evict_expired);
/// eviction is explicit, there is no background task.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, Arc<Mutex<Session>>>>,
    ttl: Option<Duration>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SessionRegistry {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Create a fresh session and return its id.
    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(Session::new(id)));
        self.sessions.lock().unwrap().insert(id, session);
        tracing::info!("Created session {id}");
        id
    }

    fn entry(&self, id: Uuid) -> Result<Arc<Mutex<Session>>, EngineError> {
        self.sessions
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(EngineError::SessionNotFound { id })
    }

    /// Run `f` against the locked session, touching `last_active`.
    fn with_session<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Session) -> T,
    ) -> Result<T, EngineError> {
        let entry = self.entry(id)?;
        let mut session = entry.lock().unwrap();
        session.last_active = Utc::now();
        Ok(f(&mut session))
    }

    /// Replace the session's index. Queries in flight keep the Arc they
    /// already resolved; new queries see the new index.
    pub fn bind_index(&self, id: Uuid, index: Arc<VectorIndex>) -> Result<(), EngineError> {
        self.with_session(id, |session| {
            session.index = Some(index);
        })
    }

    pub fn set_document_name(
        &self,
        id: Uuid,
        name: impl Into<String>,
    ) -> Result<(), EngineError> {
        let name = name.into();
        self.with_session(id, |session| {
            session.document_name = Some(name);
        })
    }

    pub fn set_language(&self, id: Uuid, language: Language) -> Result<(), EngineError> {
        self.with_session(id, |session| {
            session.language = language;
        })
    }

    /// Append a message to the session's chat history, in arrival order.
    pub fn append_message(&self, id: Uuid, message: ChatMessage) -> Result<(), EngineError> {
        self.with_session(id, |session| {
            session.chat_history.push(message);
        })
    }

    /// A point-in-time snapshot of the session. Mutating the snapshot does
    /// not affect the registry.
    pub fn get(&self, id: Uuid) -> Result<Session, EngineError> {
        let entry = self.entry(id)?;
        let session = entry.lock().unwrap();
        Ok(session.clone())
    }

    /// Remove a session. Returns whether it existed.
    pub fn delete(&self, id: Uuid) -> bool {
        let removed = self.sessions.lock().unwrap().remove(&id).is_some();
        if removed {
            tracing::info!("Deleted session {id}");
        }
        removed
    }

    pub fn list(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .values()
            .map(|entry| {
                let session = entry.lock().unwrap();
                SessionSummary {
                    id: session.id,
                    document_name: session.document_name.clone(),
                    created_at: session.created_at,
                    last_active: session.last_active,
                    message_count: session.chat_history.len(),
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().unwrap().is_empty()
    }

    /// Drop sessions idle longer than the configured TTL. A registry without
    /// a TTL never evicts. Returns the number of sessions removed.
    pub fn evict_expired(&self) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let cutoff = Utc::now() - ttl;

        let mut sessions = self.sessions.lock().unwrap();
        let expired: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, entry)| entry.lock().unwrap().last_active < cutoff)
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            sessions.remove(id);
            tracing::info!("Evicted idle session {id}");
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get() {
        let registry = SessionRegistry::default();
        let id = registry.create();

        let session = registry.get(id).unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.language, Language::En);
        assert!(session.chat_history.is_empty());
        assert!(session.index.is_none());
    }

    #[test]
    fn test_unknown_session() {
        let registry = SessionRegistry::default();
        let missing = Uuid::new_v4();

        assert!(matches!(
            registry.get(missing),
            Err(EngineError::SessionNotFound { .. })
        ));
        assert!(!registry.delete(missing));
    }

    #[test]
    fn test_history_preserves_order() {
        let registry = SessionRegistry::default();
        let id = registry.create();

        for content in ["first", "second", "third"] {
            registry
                .append_message(id, ChatMessage::new(Role::User, content))
                .unwrap();
        }

        let session = registry.get(id).unwrap();
        let contents: Vec<&str> = session
            .chat_history
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, ["first", "second", "third"]);
    }

    #[test]
    fn test_delete_then_get_is_absent() {
        let registry = SessionRegistry::default();
        let id = registry.create();

        assert!(registry.delete(id));
        assert!(matches!(
            registry.get(id),
            Err(EngineError::SessionNotFound { .. })
        ));
        // Deleting twice is a no-op.
        assert!(!registry.delete(id));
    }

    #[test]
    fn test_set_language_and_document_name() {
        let registry = SessionRegistry::default();
        let id = registry.create();

        registry.set_language(id, Language::Mr).unwrap();
        registry.set_document_name(id, "notes.pdf").unwrap();

        let session = registry.get(id).unwrap();
        assert_eq!(session.language, Language::Mr);
        assert_eq!(session.document_name.as_deref(), Some("notes.pdf"));
    }

    #[test]
    fn test_list_counts_messages() {
        let registry = SessionRegistry::default();
        let a = registry.create();
        let b = registry.create();
        registry
            .append_message(a, ChatMessage::new(Role::User, "hello"))
            .unwrap();

        let mut summaries = registry.list();
        summaries.sort_by_key(|s| s.message_count);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, b);
        assert_eq!(summaries[1].message_count, 1);
    }

    #[test]
    fn test_eviction_respects_ttl() {
        let registry = SessionRegistry::new(Some(Duration::hours(1)));
        let stale = registry.create();
        let fresh = registry.create();

        // Backdate one session past the TTL.
        {
            let sessions = registry.sessions.lock().unwrap();
            let mut session = sessions[&stale].lock().unwrap();
            session.last_active = Utc::now() - Duration::hours(2);
        }

        assert_eq!(registry.evict_expired(), 1);
        assert!(registry.get(stale).is_err());
        assert!(registry.get(fresh).is_ok());
    }

    #[test]
    fn test_no_ttl_never_evicts() {
        let registry = SessionRegistry::default();
        registry.create();
        assert_eq!(registry.evict_expired(), 0);
        assert_eq!(registry.len(), 1);
    }
}
