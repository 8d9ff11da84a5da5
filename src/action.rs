//! Mutation intents and the queue that carries them from transports into the engine loop.

use std::collections::VecDeque;
use std::sync::Mutex;

/// A fully-formed mutation intent. Carries no priority; the engine loop applies every
/// action at [`crate::priority::SourcePriority::Programmer`] (see spec open question —
/// future variants may need to carry their own priority).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SetChannel {
        universe: u16,
        channel: u16,
        value: u8,
    },
    Blackout,
}

/// Unbounded, thread-safe FIFO. Any number of producers, exactly one consumer
/// (the [`crate::engine::EngineLoop`]).
#[derive(Default)]
pub struct ActionQueue {
    queue: Mutex<VecDeque<Action>>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, action: Action) {
        self.queue.lock().unwrap().push_back(action);
    }

    pub fn pop(&self) -> Option<Action> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Atomic snapshot: the queue is empty after this returns, and the result preserves
    /// enqueue order.
    pub fn drain(&self) -> Vec<Action> {
        let mut guard = self.queue.lock().unwrap();
        guard.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }
}
