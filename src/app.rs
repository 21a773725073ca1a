//! Application orchestration layer
//!
//! Replays a transcript through a [`ResearchSession`] on the tokio clock: user actions
//! and backend events fire at their recorded offsets, render snapshots are fed back to
//! the session so completed answers land on their thread, and an optional
//! [`AnswerView`] shows the reveal live.

pub mod transcript;

use crate::config::Config;
use crate::error::{Result, RevealError};
use crate::markdown::MarkupMarkers;
use crate::render::protocol::{ActiveSource, RenderSnapshot};
use crate::render::service::{spawn_render_service, RenderHandle};
use crate::render::ui::{AnswerView, StatusLine, ViewAction, ViewFrame};
use crate::session::events::{Rating, ResultsTable};
use crate::session::threads::{ChatMessage, ThreadSummary};
use crate::session::{OutgoingMessage, ResearchSession};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use transcript::{TranscriptEntry, TranscriptEvent};

/// Replay pacing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Upper bound on how long to wait for the reveal to settle after the last entry.
    pub settle: Duration,
    /// Redraw interval when a view is attached.
    pub frame_interval: Duration,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(5),
            frame_interval: Duration::from_millis(16),
        }
    }
}

/// Final state after a replay, printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub cycle: u64,
    pub active_source: &'static str,
    pub answer_complete: bool,
    pub direct_text: String,
    pub agent_text: String,
    pub outgoing: Vec<OutgoingMessage>,
    pub completed: Vec<ChatMessage>,
    pub threads: Vec<ThreadSummary>,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultsTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_questions: Option<Value>,
}

/// Application orchestrator - owns the session and the render service task
pub struct Application {
    session: ResearchSession,
    render: RenderHandle,
    worker: JoinHandle<()>,
    markers: MarkupMarkers,
    outgoing: Vec<OutgoingMessage>,
    completed: Vec<ChatMessage>,
    status_message: Option<String>,
}

impl Application {
    /// Spawn the render service and wire a session to it. Must run inside a runtime.
    pub fn new(config: &Config) -> Self {
        let (render, worker) = spawn_render_service(&config.reveal);
        let session = ResearchSession::new(render.clone(), config.session.clone());
        Self {
            session,
            render,
            worker,
            markers: config.reveal.markers.clone(),
            outgoing: Vec::new(),
            completed: Vec::new(),
            status_message: None,
        }
    }

    /// Replay `entries`. Without a view, returns once the transcript is exhausted and
    /// the reveal has settled (or the settle bound passes). With a view, runs until the
    /// view asks to quit.
    pub async fn replay(
        &mut self,
        entries: Vec<TranscriptEntry>,
        options: ReplayOptions,
        mut view: Option<&mut dyn AnswerView>,
    ) -> Result<ReplayReport> {
        if let Some(view) = view.as_deref_mut() {
            view.initialize()?;
        }

        let outcome = self.replay_loop(entries, options, &mut view).await;

        if let Some(view) = view.as_deref_mut() {
            view.cleanup()?;
        }
        outcome?;
        self.report().await
    }

    async fn replay_loop(
        &mut self,
        entries: Vec<TranscriptEntry>,
        options: ReplayOptions,
        view: &mut Option<&mut dyn AnswerView>,
    ) -> Result<()> {
        let interactive = view.is_some();
        let started = Instant::now();
        let mut snapshots = self.render.subscribe();
        let mut pending = entries.into_iter().peekable();
        let mut settle_deadline = pending
            .peek()
            .is_none()
            .then(|| Instant::now() + options.settle);
        let mut frames = tokio::time::interval(options.frame_interval);
        frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            if pending.peek().is_none() && !interactive {
                let snapshot = self.render.sync_snapshot().await?;
                self.observe(&snapshot);
                if snapshot.is_settled() {
                    break;
                }
            }

            let next_at = pending
                .peek()
                .map(|entry| started + Duration::from_millis(entry.at_ms));

            tokio::select! {
                biased;

                _ = sleep_until_opt(next_at), if next_at.is_some() => {
                    if let Some(entry) = pending.next() {
                        self.apply(entry.event).await?;
                    }
                    if pending.peek().is_none() {
                        settle_deadline = Some(Instant::now() + options.settle);
                    }
                }
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    self.observe(&snapshot);
                }
                _ = frames.tick(), if interactive => {
                    if let Some(view) = view.as_deref_mut() {
                        let snapshot = snapshots.borrow().clone();
                        self.draw(view, &snapshot)?;
                        match view.poll_action(Duration::ZERO)? {
                            Some(ViewAction::Quit) => break,
                            Some(action) => self.apply_view_action(action).await?,
                            None => {}
                        }
                    }
                }
                _ = sleep_until_opt(settle_deadline), if settle_deadline.is_some() && !interactive => {
                    log::warn!("reveal did not settle within {:?}", options.settle);
                    break;
                }
            }
        }
        Ok(())
    }

    async fn apply(&mut self, event: TranscriptEvent) -> Result<()> {
        log::debug!("applying {event:?}");
        match event {
            TranscriptEvent::Submit { query } => {
                if let Some(request) = self.session.submit_query(&query).await? {
                    self.outgoing.push(OutgoingMessage::Query(request));
                    self.status_message = None;
                }
            }
            TranscriptEvent::Abort => self.abort().await?,
            TranscriptEvent::NewChat => self.session.new_chat().await?,
            TranscriptEvent::SelectThread { thread_id } => {
                self.session.set_active_thread(thread_id).await?
            }
            TranscriptEvent::DeleteThread { thread_id } => {
                if let Some(message) = self.session.delete_thread(thread_id).await? {
                    self.outgoing.push(message);
                }
            }
            TranscriptEvent::Main { payload } => self.session.handle_main_event(payload).await?,
            TranscriptEvent::Agent { payload } => self.session.handle_agent_event(payload).await?,
            TranscriptEvent::FinishAgentStream => self.render.finish_agent_stream().await?,
            TranscriptEvent::Feedback { rating } => self.rate(rating).await?,
        }
        Ok(())
    }

    async fn apply_view_action(&mut self, action: ViewAction) -> Result<()> {
        match action {
            ViewAction::Abort => self.abort().await,
            ViewAction::NewChat => self.session.new_chat().await,
            ViewAction::Rate(rating) => self.rate(rating).await,
            ViewAction::Quit => Ok(()),
        }
    }

    async fn rate(&mut self, rating: Rating) -> Result<()> {
        // Make sure a completion that is already published has been committed.
        let snapshot = self.render.sync_snapshot().await?;
        self.observe(&snapshot);
        match self.session.feedback(rating) {
            Some(request) => {
                self.outgoing.push(OutgoingMessage::Feedback(request));
                self.status_message = Some("feedback recorded".to_string());
            }
            None => log::debug!("ignoring {rating:?} rating: no completed answer"),
        }
        Ok(())
    }

    async fn abort(&mut self) -> Result<()> {
        if let Some(request) = self.session.abort().await? {
            self.outgoing.push(OutgoingMessage::Abort(request));
            self.status_message = Some("aborted".to_string());
        }
        Ok(())
    }

    fn observe(&mut self, snapshot: &RenderSnapshot) {
        if let Some(message) = self.session.on_snapshot(snapshot) {
            self.completed.push(message);
        }
    }

    fn draw(&self, view: &mut dyn AnswerView, snapshot: &RenderSnapshot) -> Result<()> {
        let mut status = StatusLine::from_session(&self.session);
        if let Some(message) = &self.status_message {
            status.set_message(message.clone());
        }
        view.render(&ViewFrame {
            snapshot,
            status: &status,
            markers: &self.markers,
        })
    }

    async fn report(&self) -> Result<ReplayReport> {
        let snapshot = self.render.sync_snapshot().await?;
        let active_source = match snapshot.active_source {
            ActiveSource::Idle => "idle",
            ActiveSource::Direct => "main",
            ActiveSource::Agent => "agent",
        };
        Ok(ReplayReport {
            cycle: snapshot.cycle.value(),
            active_source,
            answer_complete: snapshot.answer_complete,
            direct_text: snapshot.direct_text,
            agent_text: snapshot.agent_text,
            outgoing: self.outgoing.clone(),
            completed: self.completed.clone(),
            threads: self.session.threads().to_vec(),
            messages: self.session.active_messages().to_vec(),
            results: self.session.results().cloned(),
            graph: self.session.graph().cloned(),
            suggested_questions: self.session.suggested_questions().cloned(),
        })
    }

    /// Stop the render service and wait for it to exit.
    pub async fn shutdown(self) -> Result<()> {
        self.render.shutdown().await?;
        self.worker
            .await
            .map_err(|err| RevealError::other(format!("render service panicked: {err}")))
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
