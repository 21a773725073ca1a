//! Reveal controller state machine.
//!
//! [`RevealController`] owns the cycle token, one lane per producer, the pending agent
//! queue and the answer-complete / in-flight flags. It never touches a clock: callers
//! feed it [`RevealStep`]s (normally produced by the scheduler) and it decides whether
//! each step is still current. A step is applied only when its ticket matches the
//! active cycle and the lane's current batch; anything else is dropped before any
//! state is touched.

use crate::config::RevealConfig;
use crate::markdown::{self, ChunkPolicy, MarkupMarkers, StreamingTransform};
use crate::render::protocol::{
    ActiveSource, BatchPlan, CycleToken, Producer, RenderSnapshot, RevealState, RevealStep,
    StepTicket,
};
use std::collections::VecDeque;

/// Result of applying one reveal step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Ticket belongs to a cancelled cycle or a superseded batch.
    Stale,
    /// Char appended; the batch is still revealing.
    Revealed,
    /// Last char of the direct answer revealed.
    AnswerComplete,
    /// Last char of an agent batch revealed; `next` is the following queued batch.
    AgentBatchDone { next: Option<BatchPlan> },
}

#[derive(Debug, Default)]
struct Lane {
    reveal: RevealState,
    buffer: String,
    batch: u64,
}

impl Lane {
    fn reset_counters(&mut self) {
        self.reveal = RevealState::default();
    }

    fn accepts(&self, ticket: &StepTicket) -> bool {
        ticket.batch == self.batch && self.reveal.displayed < self.reveal.total
    }
}

/// Streaming reveal state for one chat session.
#[derive(Debug)]
pub struct RevealController {
    cycle: CycleToken,
    direct: Lane,
    agent: Lane,
    pending: VecDeque<String>,
    stream: StreamingTransform,
    active_source: ActiveSource,
    answer_complete: bool,
    in_flight: bool,
    chunking: ChunkPolicy,
    markers: MarkupMarkers,
}

impl RevealController {
    pub fn new(chunking: ChunkPolicy, markers: MarkupMarkers) -> Self {
        Self {
            cycle: CycleToken::default(),
            direct: Lane::default(),
            agent: Lane::default(),
            pending: VecDeque::new(),
            stream: StreamingTransform::new(),
            active_source: ActiveSource::Idle,
            answer_complete: false,
            in_flight: false,
            chunking,
            markers,
        }
    }

    pub fn from_config(config: &RevealConfig) -> Self {
        Self::new(config.chunking, config.markers.clone())
    }

    /// Begin a new answer: invalidates every outstanding step and clears both buffers.
    pub fn start_render_cycle(&mut self) -> CycleToken {
        self.invalidate();
        self.direct.buffer.clear();
        self.agent.buffer.clear();
        self.active_source = ActiveSource::Idle;
        self.answer_complete = false;
        self.in_flight = true;
        log::debug!("started {}", self.cycle);
        self.cycle
    }

    /// Abandon the current answer. Partially revealed text stays visible and the active
    /// source keeps pointing at it.
    pub fn cancel_render_cycle(&mut self) {
        self.invalidate();
        self.in_flight = false;
        log::debug!("cancelled render cycle, now at {}", self.cycle);
    }

    /// Cancel and wipe everything visible (new chat, thread switch).
    pub fn reset(&mut self) {
        self.cancel_render_cycle();
        self.direct.buffer.clear();
        self.agent.buffer.clear();
        self.active_source = ActiveSource::Idle;
        self.answer_complete = false;
    }

    fn invalidate(&mut self) {
        self.cycle = self.cycle.next();
        self.direct.reset_counters();
        self.agent.reset_counters();
        self.pending.clear();
        self.stream.reset();
    }

    /// Accept a complete answer from the direct producer.
    ///
    /// Supersedes any direct answer still revealing in this cycle. Returns `None` when
    /// the transformed answer is empty, in which case the answer completes immediately.
    pub fn submit_direct_answer(&mut self, full_text: &str) -> Option<BatchPlan> {
        let text = markdown::transform(full_text, &self.markers);
        let total = markdown::reveal_len(&text);

        self.active_source = ActiveSource::Direct;
        self.answer_complete = false;
        self.direct.buffer.clear();
        self.direct.batch += 1;
        self.direct.reveal = RevealState {
            displayed: 0,
            total,
        };

        if total == 0 {
            self.complete_answer();
            return None;
        }

        Some(BatchPlan {
            ticket: self.ticket(Producer::Direct, self.direct.batch),
            text,
        })
    }

    /// Accept one incremental chunk from the agent producer.
    ///
    /// Returns a plan only when the agent lane was idle; otherwise the chunk waits in
    /// the pending queue until the running batch completes.
    pub fn submit_agent_chunk(&mut self, raw_chunk: &str) -> Option<BatchPlan> {
        self.active_source = ActiveSource::Agent;
        let text = match self.chunking {
            ChunkPolicy::Independent => markdown::transform(raw_chunk, &self.markers),
            ChunkPolicy::Carry => self.stream.push(raw_chunk, &self.markers),
        };
        self.enqueue_agent_text(text)
    }

    /// Flush markup held back across chunk boundaries. No-op for independent chunking.
    pub fn finish_agent_stream(&mut self) -> Option<BatchPlan> {
        if self.chunking != ChunkPolicy::Carry {
            return None;
        }
        let tail = self.stream.finish(&self.markers);
        self.enqueue_agent_text(tail)
    }

    fn enqueue_agent_text(&mut self, text: String) -> Option<BatchPlan> {
        if text.is_empty() {
            return None;
        }
        self.pending.push_back(text);
        if self.agent.reveal.is_idle() {
            self.begin_next_agent_batch()
        } else {
            None
        }
    }

    fn begin_next_agent_batch(&mut self) -> Option<BatchPlan> {
        let text = loop {
            let chunk = self.pending.pop_front()?;
            if !chunk.is_empty() {
                break chunk;
            }
        };
        self.agent.batch += 1;
        self.agent.reveal.total += markdown::reveal_len(&text);
        Some(BatchPlan {
            ticket: self.ticket(Producer::Agent, self.agent.batch),
            text,
        })
    }

    /// Apply one scheduled reveal step.
    pub fn apply_step(&mut self, step: RevealStep) -> StepOutcome {
        let ticket = step.ticket;
        if ticket.cycle != self.cycle {
            log::trace!("dropping step from {} (active {})", ticket.cycle, self.cycle);
            return StepOutcome::Stale;
        }

        let lane = match ticket.producer {
            Producer::Direct => &mut self.direct,
            Producer::Agent => &mut self.agent,
        };
        if !lane.accepts(&ticket) {
            log::trace!(
                "dropping superseded {} step (batch {}, lane at {})",
                ticket.producer.as_str(),
                ticket.batch,
                lane.batch
            );
            return StepOutcome::Stale;
        }

        lane.buffer.push(step.ch);
        lane.reveal.displayed += 1;
        if !lane.reveal.is_idle() {
            return StepOutcome::Revealed;
        }

        match ticket.producer {
            Producer::Direct => {
                self.complete_answer();
                StepOutcome::AnswerComplete
            }
            Producer::Agent => {
                log::debug!("agent batch {} fully revealed", ticket.batch);
                StepOutcome::AgentBatchDone {
                    next: self.begin_next_agent_batch(),
                }
            }
        }
    }

    fn complete_answer(&mut self) {
        log::debug!("all characters displayed for {}", self.cycle);
        self.answer_complete = true;
        self.in_flight = false;
    }

    fn ticket(&self, producer: Producer, batch: u64) -> StepTicket {
        StepTicket {
            cycle: self.cycle,
            producer,
            batch,
        }
    }

    pub fn cycle(&self) -> CycleToken {
        self.cycle
    }

    pub fn direct_text(&self) -> &str {
        &self.direct.buffer
    }

    pub fn agent_text(&self) -> &str {
        &self.agent.buffer
    }

    pub fn direct_state(&self) -> RevealState {
        self.direct.reveal
    }

    pub fn agent_state(&self) -> RevealState {
        self.agent.reveal
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn active_source(&self) -> ActiveSource {
        self.active_source
    }

    pub fn answer_complete(&self) -> bool {
        self.answer_complete
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        let mut snapshot = RenderSnapshot::default();
        self.sync_snapshot(&mut snapshot);
        snapshot
    }

    /// Overwrite `snapshot` in place, reusing its string allocations.
    pub fn sync_snapshot(&self, snapshot: &mut RenderSnapshot) {
        snapshot.cycle = self.cycle;
        snapshot.direct_text.clone_from(&self.direct.buffer);
        snapshot.agent_text.clone_from(&self.agent.buffer);
        snapshot.direct = self.direct.reveal;
        snapshot.agent = self.agent.reveal;
        snapshot.pending_chunks = self.pending.len();
        snapshot.active_source = self.active_source;
        snapshot.answer_complete = self.answer_complete;
        snapshot.in_flight = self.in_flight;
    }
}

impl Default for RevealController {
    fn default() -> Self {
        Self::new(ChunkPolicy::default(), MarkupMarkers::default())
    }
}
