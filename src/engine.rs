//! The ~100 Hz loop that applies queued actions onto the merge buffer.

use crate::action::{Action, ActionQueue};
use crate::merge_buffer::MergeBuffer;
use crate::priority::SourcePriority;
use crate::util::BarrierFlag;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(10);

/// Drains the [`ActionQueue`] onto the [`MergeBuffer`] on a dedicated thread. Decouples
/// action intake from the output cadence: a burst of updates collapses into at most one
/// re-merge per tick before the next emission.
pub struct EngineLoop {
    merge_buffer: Arc<MergeBuffer>,
    action_queue: Arc<ActionQueue>,
    running: Arc<BarrierFlag>,
    thread: Option<thread::JoinHandle<()>>,
}

impl EngineLoop {
    pub fn new(merge_buffer: Arc<MergeBuffer>, action_queue: Arc<ActionQueue>) -> Self {
        Self {
            merge_buffer,
            action_queue,
            running: Arc::new(BarrierFlag::default()),
            thread: None,
        }
    }

    pub fn start(&mut self) -> anyhow::Result<()> {
        if self.running.swap_raise() {
            return Ok(());
        }
        let merge_buffer = self.merge_buffer.clone();
        let action_queue = self.action_queue.clone();
        let running = self.running.clone();
        self.thread = Some(
            thread::Builder::new()
                .name("engine-loop".into())
                .spawn(move || run(&merge_buffer, &action_queue, &running))?,
        );
        log::info!("engine loop started (~100 Hz)");
        Ok(())
    }

    pub fn stop(&mut self) {
        if !self.running.is_raised() {
            return;
        }
        self.running.lower();
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
        log::info!("engine loop stopped");
    }
}

impl Drop for EngineLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(merge_buffer: &MergeBuffer, action_queue: &ActionQueue, running: &BarrierFlag) {
    while running.is_raised() {
        for action in action_queue.drain() {
            apply(merge_buffer, action);
        }
        thread::sleep(TICK);
    }
}

fn apply(merge_buffer: &MergeBuffer, action: Action) {
    match action {
        Action::SetChannel {
            universe,
            channel,
            value,
        } => merge_buffer.set_value(universe, channel, value, SourcePriority::Programmer),
        Action::Blackout => {
            merge_buffer.blackout();
            log::info!("blackout executed");
        }
    }
}
