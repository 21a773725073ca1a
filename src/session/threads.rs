//! In-memory chat threads.
//!
//! Stands in for the thread persistence backend: threads are listed most recently
//! updated first and each keeps its full message list.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type ThreadId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Producer of an assistant answer (`main` or `agent`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    pub created_at_ms: u64,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>, created_at_ms: u64) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            source: None,
            response_id: None,
            created_at_ms,
        }
    }

    pub fn assistant(
        content: impl Into<String>,
        source: &str,
        response_id: Option<String>,
        created_at_ms: u64,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            source: Some(source.to_string()),
            response_id,
            created_at_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: ThreadId,
    pub title: String,
    pub last_message: String,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

#[derive(Debug, Default)]
pub struct ThreadBook {
    threads: Vec<ThreadSummary>,
    messages: HashMap<ThreadId, Vec<ChatMessage>>,
    next_id: ThreadId,
}

impl ThreadBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a thread and put it at the top of the list.
    pub fn create(&mut self, title: impl Into<String>, now_ms: u64) -> ThreadId {
        self.next_id += 1;
        let id = self.next_id;
        self.threads.insert(
            0,
            ThreadSummary {
                id,
                title: title.into(),
                last_message: String::new(),
                created_at_ms: now_ms,
                updated_at_ms: now_ms,
            },
        );
        self.messages.insert(id, Vec::new());
        id
    }

    pub fn delete(&mut self, id: ThreadId) -> bool {
        let before = self.threads.len();
        self.threads.retain(|thread| thread.id != id);
        self.messages.remove(&id);
        self.threads.len() != before
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.messages.contains_key(&id)
    }

    /// Append a message, refresh the thread preview and re-sort by last update.
    pub fn append(&mut self, id: ThreadId, message: ChatMessage, preview_chars: usize) -> bool {
        let Some(messages) = self.messages.get_mut(&id) else {
            return false;
        };
        if let Some(thread) = self.threads.iter_mut().find(|thread| thread.id == id) {
            thread.last_message = message.content.chars().take(preview_chars).collect();
            thread.updated_at_ms = message.created_at_ms;
        }
        messages.push(message);
        self.threads
            .sort_by(|a, b| b.updated_at_ms.cmp(&a.updated_at_ms));
        true
    }

    pub fn threads(&self) -> &[ThreadSummary] {
        &self.threads
    }

    pub fn messages(&self, id: ThreadId) -> &[ChatMessage] {
        self.messages.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, id: ThreadId) -> Option<&ThreadSummary> {
        self.threads.iter().find(|thread| thread.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_threads_go_first() {
        let mut book = ThreadBook::new();
        let a = book.create("first", 10);
        let b = book.create("second", 20);
        let ids: Vec<_> = book.threads().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![b, a]);
    }

    #[test]
    fn append_updates_preview_and_order() {
        let mut book = ThreadBook::new();
        let a = book.create("a", 10);
        let _b = book.create("b", 20);

        let long = "x".repeat(300);
        assert!(book.append(a, ChatMessage::user(long, 30), 200));

        let top = &book.threads()[0];
        assert_eq!(top.id, a);
        assert_eq!(top.last_message.len(), 200);
        assert_eq!(top.updated_at_ms, 30);
        assert_eq!(book.messages(a).len(), 1);
    }

    #[test]
    fn append_to_unknown_thread_is_rejected() {
        let mut book = ThreadBook::new();
        assert!(!book.append(42, ChatMessage::user("hi", 1), 200));
    }

    #[test]
    fn delete_removes_thread_and_messages() {
        let mut book = ThreadBook::new();
        let a = book.create("a", 1);
        book.append(a, ChatMessage::user("hi", 2), 200);
        assert!(book.delete(a));
        assert!(!book.contains(a));
        assert!(book.messages(a).is_empty());
        assert!(!book.delete(a));
    }
}
