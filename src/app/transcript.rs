//! JSON-lines transcripts of user actions and backend events.
//!
//! One entry per line: `{"at_ms": 120, "event": {"kind": "submit", "query": "..."}}`.
//! Blank lines and lines starting with `#` are skipped. Entries are replayed in
//! `at_ms` order; entries with equal offsets keep their file order.

use crate::error::{Result, RevealError};
use crate::session::events::{AgentEvent, MainEvent, Rating};
use crate::session::threads::ThreadId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncReadExt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Offset from replay start, in milliseconds.
    #[serde(default)]
    pub at_ms: u64,
    pub event: TranscriptEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptEvent {
    Submit { query: String },
    Abort,
    NewChat,
    SelectThread { thread_id: Option<ThreadId> },
    DeleteThread { thread_id: ThreadId },
    /// Rate the last completed answer.
    Feedback { rating: Rating },
    /// Payload received on the main answer channel.
    Main { payload: MainEvent },
    /// Payload received on the agent logging channel.
    Agent { payload: AgentEvent },
    FinishAgentStream,
}

/// Parse a whole transcript.
pub fn parse_transcript(text: &str) -> Result<Vec<TranscriptEntry>> {
    let mut entries = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let entry: TranscriptEntry = serde_json::from_str(line)
            .map_err(|err| RevealError::decode(index + 1, err.to_string()))?;
        entries.push(entry);
    }
    entries.sort_by_key(|entry| entry.at_ms);
    Ok(entries)
}

/// Read a transcript from a file, or from stdin when `path` is `None` or `-`.
pub async fn read_transcript(path: Option<&Path>) -> Result<Vec<TranscriptEntry>> {
    let text = match path {
        Some(path) if path != Path::new("-") => {
            if !path.exists() {
                return Err(RevealError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            tokio::fs::read_to_string(path).await.map_err(|err| {
                RevealError::file_error(format!("reading {}", path.display()), err)
            })?
        }
        _ => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            text
        }
    };
    let entries = parse_transcript(&text)?;
    log::debug!("loaded {} transcript entries", entries.len());
    Ok(entries)
}
