//! Wire messages exchanged with the backend WebSocket channels.
//!
//! Incoming payloads are `type`-tagged JSON objects. The main channel carries final
//! answers, graphs and suggested questions; the agent channel carries verbose logs and
//! tabular results.

use crate::session::threads::{ChatMessage, ThreadId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages arriving on the main answer channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MainEvent {
    /// Complete answer for the direct producer.
    Response { response: String },
    /// JSON-encoded relationship graph.
    Graph { response: String },
    /// Suggested follow-up questions.
    Questions { response: Value },
}

/// Messages arriving on the agent logging channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Incremental log/answer text for the agent producer.
    Logs { response: String },
    /// Tabular results for the results drawer.
    Results {
        #[serde(default)]
        columns: Vec<Value>,
        #[serde(default)]
        rows: Vec<Value>,
    },
}

/// Prior turn sent along with a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

impl From<&ChatMessage> for HistoryEntry {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub thread_id: ThreadId,
    pub history: Vec<HistoryEntry>,
    pub response_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbortRequest {
    pub thread_id: Option<ThreadId>,
    pub response_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Up,
    Down,
}

/// Rating of a completed answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub rating: Rating,
    pub prompt: String,
    pub answer: String,
    /// Producer of the rated answer (`main` or `agent`).
    pub source: String,
    pub response_id: Option<String>,
}

/// Messages the session asks the surrounding application to send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    Query(QueryRequest),
    Abort(AbortRequest),
    DeleteThread { thread_id: ThreadId },
    Feedback(FeedbackRequest),
}

/// Latest results table pushed by the agent channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsTable {
    pub columns: Vec<String>,
    pub rows: Vec<Value>,
    pub updated_at_ms: u64,
}

impl ResultsTable {
    /// Build from wire values, keeping only non-empty string column names.
    pub fn from_wire(columns: Vec<Value>, rows: Vec<Value>, updated_at_ms: u64) -> Self {
        let columns = columns
            .into_iter()
            .filter_map(|column| match column {
                Value::String(name) if !name.is_empty() => Some(name),
                _ => None,
            })
            .collect();
        Self {
            columns,
            rows,
            updated_at_ms,
        }
    }
}
