//! Chat-session glue around the render service.
//!
//! A [`ResearchSession`] is one user's chat: it decides when render cycles start and
//! stop, routes backend events to the right producer, and turns a completed answer into
//! an assistant message on the thread that asked for it. Network I/O stays outside:
//! operations return the [`OutgoingMessage`]s the caller should send.

pub mod events;
pub mod threads;

use crate::config::SessionConfig;
use crate::error::{Result, RevealError};
use crate::render::protocol::{ActiveSource, CycleToken, RenderSnapshot};
use crate::render::service::RenderHandle;
use events::{
    AbortRequest, AgentEvent, FeedbackRequest, HistoryEntry, MainEvent, QueryRequest, Rating,
    ResultsTable,
};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use threads::{ChatMessage, ThreadBook, ThreadId, ThreadSummary};

pub use events::OutgoingMessage;

/// Millisecond wall clock used for message and thread timestamps.
pub type Clock = fn() -> u64;

pub fn system_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
struct CompletedAnswer {
    answer: String,
    source: &'static str,
    response_id: Option<String>,
}

pub struct ResearchSession {
    render: RenderHandle,
    config: SessionConfig,
    threads: ThreadBook,
    active_thread: Option<ThreadId>,
    /// Thread awaiting the answer of the current cycle.
    pending_thread: Option<ThreadId>,
    cycle: Option<CycleToken>,
    processing: bool,
    response_id: Option<String>,
    response_seq: u64,
    recent_prompt: String,
    /// Untransformed producer text of the current cycle, committed on completion.
    raw_direct: String,
    raw_agent: String,
    /// Last completed answer, while it can still be rated.
    rateable: Option<CompletedAnswer>,
    results: Option<ResultsTable>,
    graph: Option<Value>,
    suggested_questions: Option<Value>,
    clock: Clock,
}

impl ResearchSession {
    pub fn new(render: RenderHandle, config: SessionConfig) -> Self {
        Self::with_clock(render, config, system_clock)
    }

    pub fn with_clock(render: RenderHandle, config: SessionConfig, clock: Clock) -> Self {
        Self {
            render,
            config,
            threads: ThreadBook::new(),
            active_thread: None,
            pending_thread: None,
            cycle: None,
            processing: false,
            response_id: None,
            response_seq: 0,
            recent_prompt: String::new(),
            raw_direct: String::new(),
            raw_agent: String::new(),
            rateable: None,
            results: None,
            graph: None,
            suggested_questions: None,
            clock,
        }
    }

    /// Submit a user query.
    ///
    /// Returns `None` for blank input or while another query is still being processed.
    pub async fn submit_query(&mut self, input: &str) -> Result<Option<QueryRequest>> {
        let query = input.trim();
        if query.is_empty() || self.processing {
            return Ok(None);
        }

        let history = self.history_snapshot();
        let cycle = self.render.start_render_cycle().await?;
        self.cycle = Some(cycle);
        self.processing = true;
        self.raw_direct.clear();
        self.raw_agent.clear();
        self.rateable = None;

        let now = (self.clock)();
        let thread_id = match self.active_thread {
            Some(id) => id,
            None => {
                let title: String = query.chars().take(self.config.title_chars).collect();
                let id = self.threads.create(title, now);
                self.active_thread = Some(id);
                id
            }
        };

        self.response_seq += 1;
        let response_id = format!("resp_{}_{}", now, self.response_seq);
        self.response_id = Some(response_id.clone());
        self.recent_prompt = query.to_string();

        self.threads.append(
            thread_id,
            ChatMessage::user(query, now),
            self.config.preview_chars,
        );
        self.pending_thread = Some(thread_id);
        log::info!("submitted query on thread {thread_id} ({cycle})");

        Ok(Some(QueryRequest {
            query: query.to_string(),
            thread_id,
            history,
            response_id,
            model: self.config.model.clone(),
        }))
    }

    /// Abort the query in progress. Returns `None` when nothing is being processed.
    pub async fn abort(&mut self) -> Result<Option<AbortRequest>> {
        if !self.processing {
            return Ok(None);
        }
        self.processing = false;
        self.cycle = None;
        self.rateable = None;
        self.render.cancel_render_cycle().await?;
        log::info!("aborted response {:?}", self.response_id);
        Ok(Some(AbortRequest {
            thread_id: self.pending_thread.take(),
            response_id: self.response_id.clone(),
        }))
    }

    pub async fn handle_main_event(&mut self, event: MainEvent) -> Result<()> {
        match event {
            MainEvent::Response { response } => {
                if self.processing {
                    self.raw_direct.clone_from(&response);
                    self.render.submit_direct_answer(response).await?;
                }
            }
            MainEvent::Graph { response } => {
                if !self.processing {
                    return Ok(());
                }
                match serde_json::from_str::<Value>(&response) {
                    Ok(graph) => self.graph = Some(graph),
                    Err(err) => log::warn!("ignoring malformed graph payload: {err}"),
                }
            }
            MainEvent::Questions { response } => {
                self.suggested_questions = Some(response);
            }
        }
        Ok(())
    }

    pub async fn handle_agent_event(&mut self, event: AgentEvent) -> Result<()> {
        if !self.processing {
            return Ok(());
        }
        match event {
            AgentEvent::Logs { response } => {
                self.raw_agent.push_str(&response);
                self.render.submit_agent_chunk(response).await?
            }
            AgentEvent::Results { columns, rows } => {
                self.results = Some(ResultsTable::from_wire(columns, rows, (self.clock)()));
            }
        }
        Ok(())
    }

    /// Feed a render snapshot; returns the assistant message recorded when the current
    /// cycle's answer has just completed.
    ///
    /// The message holds the producer's raw markdown, not the revealed display markup.
    pub fn on_snapshot(&mut self, snapshot: &RenderSnapshot) -> Option<ChatMessage> {
        if !snapshot.answer_complete || self.cycle != Some(snapshot.cycle) {
            return None;
        }
        let thread_id = self.pending_thread?;
        let text = match snapshot.active_source {
            ActiveSource::Agent => &self.raw_agent,
            ActiveSource::Direct | ActiveSource::Idle => &self.raw_direct,
        };
        if text.is_empty() {
            return None;
        }

        let source = snapshot
            .active_source
            .producer()
            .map_or("main", |producer| producer.as_str());
        let message = ChatMessage::assistant(
            text.as_str(),
            source,
            self.response_id.clone(),
            (self.clock)(),
        );
        self.rateable = Some(CompletedAnswer {
            answer: message.content.clone(),
            source,
            response_id: self.response_id.clone(),
        });
        self.threads
            .append(thread_id, message.clone(), self.config.preview_chars);
        self.pending_thread = None;
        self.processing = false;
        self.cycle = None;
        log::info!("answer for thread {thread_id} complete ({} chars)", message.content.len());
        Some(message)
    }

    /// Rate the last completed answer. `None` until an answer has completed, and again
    /// once a new query, abort, new chat or thread switch has withdrawn it.
    pub fn feedback(&self, rating: Rating) -> Option<FeedbackRequest> {
        let answer = self.rateable.as_ref()?;
        log::info!("rating {:?} {rating:?}", answer.response_id);
        Some(FeedbackRequest {
            rating,
            prompt: self.recent_prompt.clone(),
            answer: answer.answer.clone(),
            source: answer.source.to_string(),
            response_id: answer.response_id.clone(),
        })
    }

    /// Change the active thread. Leaving every thread cancels the running cycle;
    /// switching to another thread also clears the visible answer.
    pub async fn set_active_thread(&mut self, thread: Option<ThreadId>) -> Result<()> {
        match thread {
            None => {
                self.stop_processing();
                self.active_thread = None;
                self.render.cancel_render_cycle().await
            }
            Some(id) => {
                if !self.threads.contains(id) {
                    return Err(RevealError::invalid_argument(format!(
                        "unknown thread {id}"
                    )));
                }
                self.stop_processing();
                self.active_thread = Some(id);
                self.render.reset().await
            }
        }
    }

    /// Start over with no active thread and empty buffers.
    pub async fn new_chat(&mut self) -> Result<()> {
        self.stop_processing();
        self.active_thread = None;
        self.recent_prompt.clear();
        self.render.reset().await
    }

    pub async fn delete_thread(&mut self, id: ThreadId) -> Result<Option<OutgoingMessage>> {
        if !self.threads.delete(id) {
            return Ok(None);
        }
        if self.active_thread == Some(id) {
            self.new_chat().await?;
        }
        if self.pending_thread == Some(id) {
            self.pending_thread = None;
        }
        Ok(Some(OutgoingMessage::DeleteThread { thread_id: id }))
    }

    fn stop_processing(&mut self) {
        self.processing = false;
        self.pending_thread = None;
        self.cycle = None;
        self.rateable = None;
    }

    fn history_snapshot(&self) -> Vec<HistoryEntry> {
        let messages = self.active_messages();
        let start = messages.len().saturating_sub(self.config.history_window);
        messages[start..].iter().map(HistoryEntry::from).collect()
    }

    pub fn render_handle(&self) -> &RenderHandle {
        &self.render
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn active_thread(&self) -> Option<ThreadId> {
        self.active_thread
    }

    pub fn active_thread_summary(&self) -> Option<&ThreadSummary> {
        self.active_thread.and_then(|id| self.threads.get(id))
    }

    pub fn active_messages(&self) -> &[ChatMessage] {
        self.active_thread
            .map(|id| self.threads.messages(id))
            .unwrap_or(&[])
    }

    pub fn threads(&self) -> &[ThreadSummary] {
        self.threads.threads()
    }

    pub fn recent_prompt(&self) -> &str {
        &self.recent_prompt
    }

    pub fn results(&self) -> Option<&ResultsTable> {
        self.results.as_ref()
    }

    pub fn graph(&self) -> Option<&Value> {
        self.graph.as_ref()
    }

    pub fn suggested_questions(&self) -> Option<&Value> {
        self.suggested_questions.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RevealConfig;
    use crate::render::protocol::ActiveSource;
    use crate::render::service::spawn_render_service;
    use serde_json::json;
    use std::time::Duration;

    fn fixed_clock() -> u64 {
        1_700_000_000_000
    }

    fn session() -> ResearchSession {
        let (handle, _worker) = spawn_render_service(&RevealConfig::default());
        ResearchSession::with_clock(handle, SessionConfig::default(), fixed_clock)
    }

    async fn settle(session: &mut ResearchSession) -> Option<ChatMessage> {
        let mut snapshots = session.render_handle().subscribe();
        let snapshot = tokio::time::timeout(
            Duration::from_secs(5),
            snapshots.wait_for(|s| s.answer_complete && s.is_settled()),
        )
        .await
        .expect("answer never completed")
        .expect("render service stopped")
        .clone();
        session.on_snapshot(&snapshot)
    }

    #[tokio::test(start_paused = true)]
    async fn blank_or_concurrent_queries_are_ignored() {
        let mut session = session();
        assert!(session.submit_query("   ").await.unwrap().is_none());
        assert!(session.submit_query("first").await.unwrap().is_some());
        assert!(session.submit_query("second").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn query_creates_thread_with_truncated_title() {
        let mut session = session();
        let long = "q".repeat(90);
        let request = session.submit_query(&long).await.unwrap().unwrap();

        let thread = session.active_thread_summary().unwrap();
        assert_eq!(thread.id, request.thread_id);
        assert_eq!(thread.title.len(), 60);
        assert_eq!(request.response_id, "resp_1700000000000_1");
        assert!(request.history.is_empty());
        assert_eq!(session.active_messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn direct_answer_becomes_assistant_message() {
        let mut session = session();
        let request = session.submit_query("what is RRC?").await.unwrap().unwrap();
        session
            .handle_main_event(MainEvent::Response {
                response: "**RRC** is radio resource control".into(),
            })
            .await
            .unwrap();

        let message = settle(&mut session).await.expect("assistant message");
        assert_eq!(message.content, "**RRC** is radio resource control");
        assert_eq!(message.source.as_deref(), Some("main"));
        assert_eq!(message.response_id.as_deref(), Some(request.response_id.as_str()));
        assert!(!session.is_processing());
        assert_eq!(session.active_messages().len(), 2);

        let follow_up = session.submit_query("and NAS?").await.unwrap().unwrap();
        assert_eq!(follow_up.history.len(), 2);
        assert_eq!(follow_up.history[0].role, "user");
        assert_eq!(follow_up.history[1].content, "**RRC** is radio resource control");
    }

    #[tokio::test(start_paused = true)]
    async fn history_carries_raw_markdown_not_display_markers() {
        let mut session = session();
        session.submit_query("q").await.unwrap();
        session
            .handle_main_event(MainEvent::Response {
                response: "**RRC** is *x*".into(),
            })
            .await
            .unwrap();
        settle(&mut session).await.expect("assistant message");

        let snapshot = session.render_handle().sync_snapshot().await.unwrap();
        assert_eq!(snapshot.direct_text, "<b>RRC</b> is <br/>x<br/>");

        let next = session.submit_query("more").await.unwrap().unwrap();
        let sent: Vec<&str> = next.history.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(sent, vec!["q", "**RRC** is *x*"]);
        assert!(sent.iter().all(|content| !content.contains("<b>")));
    }

    #[tokio::test(start_paused = true)]
    async fn feedback_requires_a_completed_answer() {
        let mut session = session();
        assert!(session.feedback(Rating::Up).is_none());

        let request = session.submit_query("what is PDCP?").await.unwrap().unwrap();
        assert!(session.feedback(Rating::Up).is_none());
        session
            .handle_main_event(MainEvent::Response {
                response: "**PDCP** compresses headers".into(),
            })
            .await
            .unwrap();
        assert!(session.feedback(Rating::Down).is_none());

        settle(&mut session).await.expect("assistant message");
        let feedback = session.feedback(Rating::Down).expect("rateable answer");
        assert_eq!(feedback.rating, Rating::Down);
        assert_eq!(feedback.prompt, "what is PDCP?");
        assert_eq!(feedback.answer, "**PDCP** compresses headers");
        assert_eq!(feedback.source, "main");
        assert_eq!(feedback.response_id, Some(request.response_id));
        // Re-rating the same answer is allowed.
        assert_eq!(session.feedback(Rating::Up).unwrap().rating, Rating::Up);

        session.submit_query("next").await.unwrap();
        assert!(session.feedback(Rating::Up).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_or_abandoned_answers_cannot_be_rated() {
        let mut session = session();
        session.submit_query("q").await.unwrap();
        session
            .handle_main_event(MainEvent::Response {
                response: "short".into(),
            })
            .await
            .unwrap();
        settle(&mut session).await.expect("assistant message");
        assert!(session.feedback(Rating::Up).is_some());

        session.new_chat().await.unwrap();
        assert!(session.feedback(Rating::Up).is_none());

        session.submit_query("again").await.unwrap();
        session.abort().await.unwrap();
        assert!(session.feedback(Rating::Up).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn completion_is_recorded_once() {
        let mut session = session();
        session.submit_query("q").await.unwrap();
        session
            .handle_main_event(MainEvent::Response {
                response: "a".into(),
            })
            .await
            .unwrap();
        assert!(settle(&mut session).await.is_some());
        let snapshot = session.render_handle().sync_snapshot().await.unwrap();
        assert!(session.on_snapshot(&snapshot).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn events_are_gated_while_idle() {
        let mut session = session();
        session
            .handle_agent_event(AgentEvent::Logs {
                response: "stray".into(),
            })
            .await
            .unwrap();
        session
            .handle_agent_event(AgentEvent::Results {
                columns: vec![json!("a")],
                rows: vec![],
            })
            .await
            .unwrap();
        session
            .handle_main_event(MainEvent::Questions {
                response: json!(["next?"]),
            })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let snapshot = session.render_handle().sync_snapshot().await.unwrap();
        assert_eq!(snapshot.agent_text, "");
        assert!(session.results().is_none());
        assert_eq!(session.suggested_questions(), Some(&json!(["next?"])));
    }

    #[tokio::test(start_paused = true)]
    async fn agent_logs_and_results_flow_while_processing() {
        let mut session = session();
        session.submit_query("trace it").await.unwrap();
        session
            .handle_agent_event(AgentEvent::Logs {
                response: "step 1*".into(),
            })
            .await
            .unwrap();
        session
            .handle_agent_event(AgentEvent::Results {
                columns: vec![json!("spec"), json!(null)],
                rows: vec![json!(["38.331"])],
            })
            .await
            .unwrap();
        session
            .handle_main_event(MainEvent::Graph {
                response: r#"{"nodes":[],"edges":[]}"#.into(),
            })
            .await
            .unwrap();

        let mut snapshots = session.render_handle().subscribe();
        let snapshot = snapshots
            .wait_for(|s| s.agent_text == "step 1<br/>")
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.active_source, ActiveSource::Agent);
        assert_eq!(session.results().unwrap().columns, vec!["spec"]);
        assert_eq!(session.graph(), Some(&json!({"nodes": [], "edges": []})));
    }

    #[tokio::test(start_paused = true)]
    async fn abort_cancels_and_reports_pending_thread() {
        let mut session = session();
        let request = session.submit_query("long one").await.unwrap().unwrap();
        session
            .handle_main_event(MainEvent::Response {
                response: "x".repeat(500),
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(3)).await;

        let abort = session.abort().await.unwrap().unwrap();
        assert_eq!(abort.thread_id, Some(request.thread_id));
        assert_eq!(abort.response_id, Some(request.response_id));
        assert!(session.abort().await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(500)).await;
        let snapshot = session.render_handle().sync_snapshot().await.unwrap();
        assert!(!snapshot.answer_complete);
        assert!(snapshot.direct_text.len() < 500);
        assert!(session.on_snapshot(&snapshot).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_all_threads_cancels_cycle() {
        let mut session = session();
        session.submit_query("q").await.unwrap();
        let before = session.render_handle().sync_snapshot().await.unwrap().cycle;

        session.set_active_thread(None).await.unwrap();
        let after = session.render_handle().sync_snapshot().await.unwrap();
        assert!(after.cycle > before);
        assert!(!after.in_flight);
        assert!(!session.is_processing());
    }

    #[tokio::test(start_paused = true)]
    async fn deleting_active_thread_resets_chat() {
        let mut session = session();
        let request = session.submit_query("q").await.unwrap().unwrap();

        let outgoing = session.delete_thread(request.thread_id).await.unwrap();
        assert_eq!(
            outgoing,
            Some(OutgoingMessage::DeleteThread {
                thread_id: request.thread_id
            })
        );
        assert!(session.active_thread().is_none());
        assert!(session.threads().is_empty());
        assert!(session.delete_thread(request.thread_id).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn selecting_unknown_thread_fails() {
        let mut session = session();
        let err = session.set_active_thread(Some(77)).await.unwrap_err();
        assert!(matches!(err, RevealError::InvalidArgument { .. }));
    }
}
