//! View state handed to an [`AnswerView`](crate::render::ui::AnswerView) each frame.

use crate::markdown::MarkupMarkers;
use crate::render::protocol::{ActiveSource, RenderSnapshot};
use crate::session::ResearchSession;

/// Everything a view needs to draw one frame.
#[derive(Debug, Clone, Copy)]
pub struct ViewFrame<'a> {
    pub snapshot: &'a RenderSnapshot,
    pub status: &'a StatusLine,
    pub markers: &'a MarkupMarkers,
}

/// Session facts shown in the status line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusLine {
    pub thread_title: Option<String>,
    pub prompt: String,
    pub processing: bool,
    pub message_count: usize,
    pub message: Option<String>,
}

impl StatusLine {
    pub fn from_session(session: &ResearchSession) -> Self {
        Self {
            thread_title: session.active_thread_summary().map(|t| t.title.clone()),
            prompt: session.recent_prompt().to_string(),
            processing: session.is_processing(),
            message_count: session.active_messages().len(),
            message: None,
        }
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    /// Single-line summary: thread, source, progress and flags.
    pub fn format(&self, snapshot: &RenderSnapshot) -> String {
        let source = match snapshot.active_source {
            ActiveSource::Idle => "idle",
            ActiveSource::Direct => "main",
            ActiveSource::Agent => "agent",
        };
        let progress = match snapshot.active_source {
            ActiveSource::Agent => snapshot.agent,
            ActiveSource::Direct | ActiveSource::Idle => snapshot.direct,
        };
        let mut line = format!(
            "{} | {} | {} {}/{}",
            self.thread_title.as_deref().unwrap_or("new chat"),
            snapshot.cycle,
            source,
            progress.displayed,
            progress.total
        );
        if snapshot.pending_chunks > 0 {
            line.push_str(&format!(" (+{} queued)", snapshot.pending_chunks));
        }
        if self.processing {
            line.push_str(" | working");
        }
        if snapshot.answer_complete {
            line.push_str(" | complete");
        }
        if let Some(message) = &self.message {
            line.push_str(" | ");
            line.push_str(message);
        }
        line
    }
}
