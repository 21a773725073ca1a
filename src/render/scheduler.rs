//! Timed emission of reveal steps.
//!
//! Each [`BatchPlan`] becomes one tokio task that walks the batch's chars and sends a
//! [`RevealStep`] at `start + step * index`, so later chars always land later and the
//! batch is revealed in source order. Every task runs under a child of the current
//! cycle's [`CancellationToken`]. Cancelling a cycle stops its tasks at their next
//! suspension point; steps already sent are neutralised by the controller's ticket
//! check.

use crate::config::RevealConfig;
use crate::render::protocol::{BatchPlan, Producer, RevealStep};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Spawns and cancels batch tasks for one render service.
pub struct RevealScheduler {
    steps: UnboundedSender<RevealStep>,
    cycle: CancellationToken,
    direct_batch: Option<CancellationToken>,
    direct_step: Duration,
    agent_step: Duration,
}

impl RevealScheduler {
    pub fn new(steps: UnboundedSender<RevealStep>, direct_step: Duration, agent_step: Duration) -> Self {
        Self {
            steps,
            cycle: CancellationToken::new(),
            direct_batch: None,
            direct_step,
            agent_step,
        }
    }

    pub fn from_config(steps: UnboundedSender<RevealStep>, config: &RevealConfig) -> Self {
        Self::new(steps, config.direct_step(), config.agent_step())
    }

    /// Delay between consecutive chars for a producer.
    pub fn step_for(&self, producer: Producer) -> Duration {
        match producer {
            Producer::Direct => self.direct_step,
            Producer::Agent => self.agent_step,
        }
    }

    /// Start emitting the steps of `plan`. Returns immediately.
    ///
    /// A direct batch cancels the previous direct batch of the same cycle.
    pub fn schedule(&mut self, plan: BatchPlan) -> JoinHandle<()> {
        let token = self.cycle.child_token();
        if plan.ticket.producer == Producer::Direct {
            if let Some(previous) = self.direct_batch.replace(token.clone()) {
                previous.cancel();
            }
        }
        let step = self.step_for(plan.ticket.producer);
        log::trace!(
            "scheduling {} chars for {} batch {} of {}",
            plan.len(),
            plan.ticket.producer.as_str(),
            plan.ticket.batch,
            plan.ticket.cycle
        );
        tokio::spawn(run_batch(plan, step, token, self.steps.clone()))
    }

    /// Stop every task of the current cycle and open a fresh cancellation scope.
    pub fn cancel_cycle(&mut self) {
        self.cycle.cancel();
        self.cycle = CancellationToken::new();
        self.direct_batch = None;
    }

    pub fn shutdown(&mut self) {
        self.cycle.cancel();
        self.direct_batch = None;
    }
}

async fn run_batch(
    plan: BatchPlan,
    step: Duration,
    token: CancellationToken,
    steps: UnboundedSender<RevealStep>,
) {
    let start = Instant::now();
    for reveal in plan.steps() {
        let factor = u32::try_from(reveal.index).unwrap_or(u32::MAX);
        let deadline = start + step.saturating_mul(factor);
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = tokio::time::sleep_until(deadline) => {}
        }
        if steps.send(reveal).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::protocol::{CycleToken, StepTicket};
    use tokio::sync::mpsc;

    fn plan(producer: Producer, batch: u64, text: &str) -> BatchPlan {
        BatchPlan {
            ticket: StepTicket {
                cycle: CycleToken::default(),
                producer,
                batch,
            },
            text: text.to_string(),
        }
    }

    async fn collect(rx: &mut mpsc::UnboundedReceiver<RevealStep>) -> String {
        let mut out = String::new();
        while let Ok(step) = rx.try_recv() {
            out.push(step.ch);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn emits_chars_in_order_at_increasing_delays() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = RevealScheduler::new(tx, Duration::from_millis(2), Duration::from_millis(4));

        let started = Instant::now();
        scheduler.schedule(plan(Producer::Direct, 1, "abc")).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(4));
        assert_eq!(collect(&mut rx).await, "abc");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_cycle_stops_pending_batches() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = RevealScheduler::new(tx, Duration::from_millis(10), Duration::from_millis(10));

        let handle = scheduler.schedule(plan(Producer::Agent, 1, "abcdef"));
        tokio::time::sleep(Duration::from_millis(15)).await;
        scheduler.cancel_cycle();
        handle.await.unwrap();

        let revealed = collect(&mut rx).await;
        assert!(revealed.len() < 6, "cancelled batch revealed {revealed:?}");
        assert!("abcdef".starts_with(&revealed));
    }

    #[tokio::test(start_paused = true)]
    async fn new_direct_batch_cancels_previous_direct_batch() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = RevealScheduler::new(tx, Duration::from_millis(10), Duration::from_millis(10));

        let first = scheduler.schedule(plan(Producer::Direct, 1, "xxxxxx"));
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = scheduler.schedule(plan(Producer::Direct, 2, "yy"));
        first.await.unwrap();
        second.await.unwrap();

        let revealed = collect(&mut rx).await;
        assert!(revealed.ends_with("yy"));
        assert!(revealed.matches('x').count() < 6);
    }

    #[test]
    fn pacing_comes_from_config() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let scheduler = RevealScheduler::from_config(tx, &RevealConfig::default());
        assert_eq!(scheduler.step_for(Producer::Direct), Duration::from_micros(500));
        assert_eq!(scheduler.step_for(Producer::Agent), Duration::from_millis(1));
    }
}
