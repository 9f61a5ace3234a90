use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A chat message that can be persisted alongside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializableMessage {
    pub role: MessageRole,
    pub content: String,
}

impl SerializableMessage {
    pub fn user(content: String) -> Self {
        Self {
            role: MessageRole::User,
            content,
        }
    }

    pub fn assistant(content: String) -> Self {
        Self {
            role: MessageRole::Assistant,
            content,
        }
    }

    pub fn system(content: String) -> Self {
        Self {
            role: MessageRole::System,
            content,
        }
    }
}

/// Context for sharing data within one session.
///
/// Holds a key/value map for arbitrary serializable state plus an ordered,
/// append-only chat history. Cloning is cheap and all clones share the same
/// underlying data.
#[derive(Clone, Debug)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
    chat_history: Arc<RwLock<Vec<SerializableMessage>>>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            chat_history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: impl serde::Serialize) {
        let value = serde_json::to_value(value).expect("Failed to serialize value");
        self.data.insert(key.into(), value);
    }

    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Synchronous variant of [`Context::get`] for non-async call sites.
    pub fn get_sync<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.data.remove(key).map(|(_, v)| v)
    }

    /// Clear the key/value map. Chat history is left untouched; use
    /// [`Context::clear_messages`] for that.
    pub async fn clear(&self) {
        self.data.clear();
    }

    pub async fn add_user_message(&self, content: String) {
        let mut history = self.chat_history.write().await;
        history.push(SerializableMessage::user(content));
    }

    pub async fn add_assistant_message(&self, content: String) {
        let mut history = self.chat_history.write().await;
        history.push(SerializableMessage::assistant(content));
    }

    pub async fn get_all_messages(&self) -> Vec<SerializableMessage> {
        self.chat_history.read().await.clone()
    }

    pub async fn get_last_messages(&self, n: usize) -> Vec<SerializableMessage> {
        let history = self.chat_history.read().await;
        let start = history.len().saturating_sub(n);
        history[start..].to_vec()
    }

    pub async fn message_count(&self) -> usize {
        self.chat_history.read().await.len()
    }

    pub async fn clear_messages(&self) {
        self.chat_history.write().await.clear();
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
