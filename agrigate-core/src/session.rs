//! Conversation sessions and the store contract.
//!
//! A session is an append-only message log scoped by `(user_id,
//! session_id)`. The core owns the logical contract only; durability,
//! pooling, and retries belong to whichever [`ConversationStore`]
//! implementation is mounted. The bundled [`MemoryConversationStore`]
//! backs tests and single-process deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Maximum length of a derived session title, in characters.
pub const MAX_TITLE_LEN: usize = 60;

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// An attachment carried by a message (currently images for pest
/// detection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    /// MIME type, e.g. "image/jpeg"
    pub media_type: String,
    /// Base64-encoded content
    pub data: String,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

/// Execution metadata attached to an assistant message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_to: Option<String>,
}

/// A message in a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id; appends are idempotent on it
    pub id: String,
    pub role: MessageRole,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub metadata: MessageMetadata,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }

    fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            attachments: Vec::new(),
            metadata: MessageMetadata::default(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// A conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    /// Derived from the first user message; set exactly once
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    /// Always equals `messages.len()`
    pub message_count: usize,
}

/// Summary of a session (message list omitted)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub user_id: String,
    pub title: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl Session {
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            title: self.title.clone(),
            message_count: self.message_count,
            created_at: self.created_at,
            last_updated_at: self.last_updated_at,
        }
    }
}

/// Derive a session title from the first user message.
///
/// Truncation respects character boundaries; an ellipsis marks the cut.
pub fn derive_title(text: &str) -> String {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return "New conversation".to_string();
    }
    if cleaned.chars().count() <= MAX_TITLE_LEN {
        return cleaned;
    }
    let truncated: String = cleaned.chars().take(MAX_TITLE_LEN - 1).collect();
    format!("{}…", truncated.trim_end())
}

/// Errors that can occur during session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Storage backend error
    #[error("storage error: {0}")]
    Storage(String),
    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Trait for conversation storage backends.
///
/// All operations are scoped by `user_id`; a session is never visible to
/// another user. Implementations must preserve message append order.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append a message, creating the session if absent.
    ///
    /// Idempotent on `(session_id, message.id)`: re-appending a message
    /// with an id already present is a no-op.
    async fn append(
        &self,
        user_id: &str,
        session_id: &str,
        message: Message,
    ) -> Result<(), SessionError>;

    /// Sessions for this user, most recently updated first.
    async fn list(&self, user_id: &str, limit: usize) -> Result<Vec<SessionSummary>, SessionError>;

    /// Full message history, or `None` if unknown.
    async fn get(&self, user_id: &str, session_id: &str) -> Result<Option<Session>, SessionError>;

    /// Delete a session. Returns whether anything was removed.
    async fn delete(&self, user_id: &str, session_id: &str) -> Result<bool, SessionError>;
}

/// In-memory conversation store.
///
/// Lock discipline: one process-wide `RwLock`; critical sections never
/// span I/O.
#[derive(Default)]
pub struct MemoryConversationStore {
    sessions: RwLock<HashMap<(String, String), Session>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn append(
        &self,
        user_id: &str,
        session_id: &str,
        message: Message,
    ) -> Result<(), SessionError> {
        let key = (user_id.to_string(), session_id.to_string());
        let mut sessions = self.sessions.write();
        let now = Utc::now();

        match sessions.get_mut(&key) {
            Some(session) => {
                if session.messages.iter().any(|m| m.id == message.id) {
                    return Ok(());
                }
                session.messages.push(message);
                session.message_count = session.messages.len();
                session.last_updated_at = now;
            }
            None => {
                let title = match message.role {
                    MessageRole::User => derive_title(&message.text),
                    _ => "New conversation".to_string(),
                };
                sessions.insert(
                    key,
                    Session {
                        session_id: session_id.to_string(),
                        user_id: user_id.to_string(),
                        title,
                        message_count: 1,
                        messages: vec![message],
                        created_at: now,
                        last_updated_at: now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn list(&self, user_id: &str, limit: usize) -> Result<Vec<SessionSummary>, SessionError> {
        let sessions = self.sessions.read();
        let mut summaries: Vec<SessionSummary> = sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(Session::summary)
            .collect();
        summaries.sort_by(|a, b| b.last_updated_at.cmp(&a.last_updated_at));
        summaries.truncate(limit);
        Ok(summaries)
    }

    async fn get(&self, user_id: &str, session_id: &str) -> Result<Option<Session>, SessionError> {
        let key = (user_id.to_string(), session_id.to_string());
        Ok(self.sessions.read().get(&key).cloned())
    }

    async fn delete(&self, user_id: &str, session_id: &str) -> Result<bool, SessionError> {
        let key = (user_id.to_string(), session_id.to_string());
        Ok(self.sessions.write().remove(&key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_creates_session_with_derived_title() {
        let store = MemoryConversationStore::new();
        store
            .append("u1", "s1", Message::user("How much nitrogen does maize need?"))
            .await
            .unwrap();

        let session = store.get("u1", "s1").await.unwrap().unwrap();
        assert_eq!(session.title, "How much nitrogen does maize need?");
        assert_eq!(session.message_count, 1);
        assert_eq!(session.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_append_is_idempotent_on_message_id() {
        let store = MemoryConversationStore::new();
        let message = Message::user("hello");
        store.append("u1", "s1", message.clone()).await.unwrap();
        store.append("u1", "s1", message.clone()).await.unwrap();

        let session = store.get("u1", "s1").await.unwrap().unwrap();
        assert_eq!(session.message_count, 1);
    }

    #[tokio::test]
    async fn test_message_count_tracks_messages_and_last_id() {
        let store = MemoryConversationStore::new();
        store.append("u1", "s1", Message::user("one")).await.unwrap();
        let reply = Message::assistant("two");
        let reply_id = reply.id.clone();
        store.append("u1", "s1", reply).await.unwrap();

        let session = store.get("u1", "s1").await.unwrap().unwrap();
        assert_eq!(session.message_count, session.messages.len());
        assert_eq!(session.messages.last().unwrap().id, reply_id);
        assert!(session.last_updated_at >= session.created_at);
    }

    #[tokio::test]
    async fn test_title_set_exactly_once() {
        let store = MemoryConversationStore::new();
        store.append("u1", "s1", Message::user("first question")).await.unwrap();
        store.append("u1", "s1", Message::user("second question")).await.unwrap();

        let session = store.get("u1", "s1").await.unwrap().unwrap();
        assert_eq!(session.title, "first question");
    }

    #[tokio::test]
    async fn test_list_scoped_and_most_recent_first() {
        let store = MemoryConversationStore::new();
        store.append("u1", "s1", Message::user("a")).await.unwrap();
        store.append("u1", "s2", Message::user("b")).await.unwrap();
        store.append("u2", "s3", Message::user("c")).await.unwrap();
        // bump s1
        store.append("u1", "s1", Message::assistant("reply")).await.unwrap();

        let listed = store.list("u1", 10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].session_id, "s1");
        assert_eq!(listed[1].session_id, "s2");

        let limited = store.list("u1", 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_get_is_user_scoped() {
        let store = MemoryConversationStore::new();
        store.append("u1", "s1", Message::user("a")).await.unwrap();
        assert!(store.get("u2", "s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_reports_removal() {
        let store = MemoryConversationStore::new();
        store.append("u1", "s1", Message::user("a")).await.unwrap();
        assert!(store.delete("u1", "s1").await.unwrap());
        assert!(!store.delete("u1", "s1").await.unwrap());
        assert!(store.get("u1", "s1").await.unwrap().is_none());
    }

    #[test]
    fn test_derive_title_truncates_on_char_boundary() {
        let long = "x".repeat(200);
        let title = derive_title(&long);
        assert!(title.chars().count() <= MAX_TITLE_LEN);
        assert!(title.ends_with('…'));

        assert_eq!(derive_title("  short   question  "), "short question");
        assert_eq!(derive_title(""), "New conversation");
    }
}
