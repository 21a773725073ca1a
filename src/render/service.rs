//! Render service: the single task that owns a [`RevealController`].
//!
//! Callers never touch the controller directly. They hold a cloneable [`RenderHandle`]
//! that forwards [`RenderCommand`]s, and they observe the result through a `watch`
//! channel of [`RenderSnapshot`]s. Scheduler tasks feed reveal steps back into the same
//! loop, so every mutation happens on one task and no locking is needed.

use crate::config::RevealConfig;
use crate::error::{Result, RevealError};
use crate::render::protocol::{CycleToken, RenderCommand, RenderSnapshot, RevealStep};
use crate::render::scheduler::RevealScheduler;
use crate::render::state::{RevealController, StepOutcome};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

const COMMAND_BUFFER: usize = 64;

/// Cloneable front door to a running render service.
#[derive(Clone)]
pub struct RenderHandle {
    commands: mpsc::Sender<RenderCommand>,
    snapshots: watch::Receiver<RenderSnapshot>,
}

impl RenderHandle {
    /// Start a new answer cycle. Must be called once per user submission, before the
    /// query is sent to the backend.
    pub async fn start_render_cycle(&self) -> Result<CycleToken> {
        let (reply, token) = oneshot::channel();
        self.send(RenderCommand::StartCycle { reply }).await?;
        token.await.map_err(|_| RevealError::ServiceUnavailable)
    }

    /// Invalidate everything scheduled under the current cycle.
    pub async fn cancel_render_cycle(&self) -> Result<()> {
        self.send(RenderCommand::CancelCycle).await
    }

    pub async fn submit_direct_answer(&self, full_text: impl Into<String>) -> Result<()> {
        self.send(RenderCommand::DirectAnswer(full_text.into())).await
    }

    pub async fn submit_agent_chunk(&self, raw_chunk: impl Into<String>) -> Result<()> {
        self.send(RenderCommand::AgentChunk(raw_chunk.into())).await
    }

    /// Flush markup carried across agent chunks (only meaningful with carry chunking).
    pub async fn finish_agent_stream(&self) -> Result<()> {
        self.send(RenderCommand::FinishAgentStream).await
    }

    /// Cancel the cycle and clear both buffers.
    pub async fn reset(&self) -> Result<()> {
        self.send(RenderCommand::Reset).await
    }

    /// Snapshot that reflects every command sent through this handle so far.
    pub async fn sync_snapshot(&self) -> Result<RenderSnapshot> {
        let (reply, snapshot) = oneshot::channel();
        self.send(RenderCommand::Snapshot { reply }).await?;
        snapshot.await.map_err(|_| RevealError::ServiceUnavailable)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(RenderCommand::Shutdown).await
    }

    pub fn subscribe(&self) -> watch::Receiver<RenderSnapshot> {
        self.snapshots.clone()
    }

    async fn send(&self, command: RenderCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RevealError::ServiceUnavailable)
    }
}

/// Spawn a render service on the current tokio runtime.
pub fn spawn_render_service(config: &RevealConfig) -> (RenderHandle, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (snapshot_tx, snapshot_rx) = watch::channel(RenderSnapshot::default());
    let controller = RevealController::from_config(config);
    let config = config.clone();

    let worker = tokio::spawn(async move {
        render_service_loop(command_rx, snapshot_tx, controller, &config).await;
    });

    (
        RenderHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        },
        worker,
    )
}

/// Run the render service until shutdown or until every handle is dropped.
pub async fn render_service_loop(
    mut commands: mpsc::Receiver<RenderCommand>,
    snapshots: watch::Sender<RenderSnapshot>,
    controller: RevealController,
    config: &RevealConfig,
) {
    let (step_tx, mut step_rx) = mpsc::unbounded_channel();
    let mut state = ServiceState {
        controller,
        scheduler: RevealScheduler::from_config(step_tx, config),
    };

    loop {
        let outcome = tokio::select! {
            biased;
            command = commands.recv() => match command {
                Some(command) => state.handle_command(command),
                None => HandlerOutcome::Exit,
            },
            Some(step) = step_rx.recv() => state.handle_step(step),
        };

        if outcome.publishes() {
            snapshots.send_modify(|snapshot| state.controller.sync_snapshot(snapshot));
        }
        if outcome == HandlerOutcome::Exit {
            break;
        }
    }

    state.scheduler.shutdown();
    log::debug!("render service stopped at {}", state.controller.cycle());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandlerOutcome {
    Changed,
    Unchanged,
    Exit,
}

impl HandlerOutcome {
    fn publishes(self) -> bool {
        self != HandlerOutcome::Unchanged
    }
}

struct ServiceState {
    controller: RevealController,
    scheduler: RevealScheduler,
}

impl ServiceState {
    fn handle_command(&mut self, command: RenderCommand) -> HandlerOutcome {
        match command {
            RenderCommand::StartCycle { reply } => {
                let token = self.controller.start_render_cycle();
                self.scheduler.cancel_cycle();
                let _ = reply.send(token);
            }
            RenderCommand::CancelCycle => {
                self.controller.cancel_render_cycle();
                self.scheduler.cancel_cycle();
            }
            RenderCommand::Reset => {
                self.controller.reset();
                self.scheduler.cancel_cycle();
            }
            RenderCommand::DirectAnswer(text) => {
                if let Some(plan) = self.controller.submit_direct_answer(&text) {
                    self.scheduler.schedule(plan);
                }
            }
            RenderCommand::AgentChunk(chunk) => {
                if let Some(plan) = self.controller.submit_agent_chunk(&chunk) {
                    self.scheduler.schedule(plan);
                }
            }
            RenderCommand::FinishAgentStream => {
                if let Some(plan) = self.controller.finish_agent_stream() {
                    self.scheduler.schedule(plan);
                }
            }
            RenderCommand::Snapshot { reply } => {
                let _ = reply.send(self.controller.snapshot());
                return HandlerOutcome::Unchanged;
            }
            RenderCommand::Shutdown => return HandlerOutcome::Exit,
        }
        HandlerOutcome::Changed
    }

    fn handle_step(&mut self, step: RevealStep) -> HandlerOutcome {
        match self.controller.apply_step(step) {
            StepOutcome::Stale => HandlerOutcome::Unchanged,
            StepOutcome::AgentBatchDone { next: Some(plan) } => {
                self.scheduler.schedule(plan);
                HandlerOutcome::Changed
            }
            StepOutcome::Revealed
            | StepOutcome::AnswerComplete
            | StepOutcome::AgentBatchDone { next: None } => HandlerOutcome::Changed,
        }
    }
}
