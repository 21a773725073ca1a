//! Protocol definitions shared between the render service, its handle, and the
//! reveal scheduler.

use std::fmt;
use tokio::sync::oneshot;

/// Identifier of one logical answer in progress. Strictly increasing per controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CycleToken(u64);

impl CycleToken {
    pub fn value(self) -> u64 {
        self.0
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for CycleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle#{}", self.0)
    }
}

/// Which backend channel produced a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Producer {
    /// Complete final answer delivered in one payload.
    Direct,
    /// Incremental log/answer fragments revealed in arrival order.
    Agent,
}

impl Producer {
    pub fn as_str(self) -> &'static str {
        match self {
            Producer::Direct => "main",
            Producer::Agent => "agent",
        }
    }
}

/// Which buffer the display should treat as authoritative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActiveSource {
    #[default]
    Idle,
    Direct,
    Agent,
}

impl ActiveSource {
    pub fn producer(self) -> Option<Producer> {
        match self {
            ActiveSource::Idle => None,
            ActiveSource::Direct => Some(Producer::Direct),
            ActiveSource::Agent => Some(Producer::Agent),
        }
    }
}

/// Identity captured by every scheduled reveal step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTicket {
    pub cycle: CycleToken,
    pub producer: Producer,
    /// Per-lane batch sequence number; a newer batch supersedes older ones.
    pub batch: u64,
}

/// One unit of reveal work: make `ch` visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealStep {
    pub ticket: StepTicket,
    pub index: usize,
    pub ch: char,
}

/// Transformed text ready to be scheduled as one batch of reveal steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub ticket: StepTicket,
    pub text: String,
}

impl BatchPlan {
    /// Reveal steps of this batch in source order.
    pub fn steps(&self) -> impl Iterator<Item = RevealStep> + '_ {
        let ticket = self.ticket;
        self.text
            .chars()
            .enumerate()
            .map(move |(index, ch)| RevealStep { ticket, index, ch })
    }

    pub(crate) fn len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Displayed vs expected char counts for one lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevealState {
    pub displayed: usize,
    pub total: usize,
}

impl RevealState {
    pub fn is_idle(&self) -> bool {
        self.displayed == self.total
    }
}

/// Read-only view of the controller published after every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSnapshot {
    pub cycle: CycleToken,
    pub direct_text: String,
    pub agent_text: String,
    pub direct: RevealState,
    pub agent: RevealState,
    pub pending_chunks: usize,
    pub active_source: ActiveSource,
    pub answer_complete: bool,
    pub in_flight: bool,
}

impl RenderSnapshot {
    /// Text of the buffer currently deemed authoritative.
    pub fn authoritative_text(&self) -> &str {
        match self.active_source {
            ActiveSource::Agent => &self.agent_text,
            ActiveSource::Direct | ActiveSource::Idle => &self.direct_text,
        }
    }

    /// True when neither lane has unrevealed or queued text.
    pub fn is_settled(&self) -> bool {
        self.direct.is_idle() && self.agent.is_idle() && self.pending_chunks == 0
    }
}

/// Commands sent from a [`RenderHandle`](crate::render::service::RenderHandle) to the service.
#[derive(Debug)]
pub enum RenderCommand {
    StartCycle { reply: oneshot::Sender<CycleToken> },
    CancelCycle,
    DirectAnswer(String),
    AgentChunk(String),
    FinishAgentStream,
    /// Reply with the snapshot after every previously sent command has been applied.
    Snapshot { reply: oneshot::Sender<RenderSnapshot> },
    /// Cancel the cycle and clear both buffers (new chat / thread switch).
    Reset,
    Shutdown,
}
