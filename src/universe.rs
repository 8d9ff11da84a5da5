//! Per-universe priority merge storage.

use crate::priority::{SourcePriority, PRIORITY_COUNT};
use std::sync::atomic::{AtomicBool, Ordering};

pub const NUM_CHANNELS: usize = 512;

#[derive(Clone, Copy, Default)]
struct ChannelState {
    values: [u8; PRIORITY_COUNT],
    active: [bool; PRIORITY_COUNT],
}

impl ChannelState {
    #[inline]
    fn merge(&self) -> u8 {
        for p in (0..PRIORITY_COUNT).rev() {
            if self.active[p] {
                return self.values[p];
            }
        }
        0
    }
}

/// 512 channels of priority-merge state for one DMX universe, plus a dirty flag.
///
/// Reading never clears dirty; only `clear_dirty` does. The dirty flag uses relaxed
/// atomics — callers needing a happens-before relationship already hold the
/// [`crate::merge_buffer::MergeBuffer`] lock around both the mutation and the read.
pub struct PriorityUniverse {
    channels: [ChannelState; NUM_CHANNELS],
    dirty: AtomicBool,
}

impl Default for PriorityUniverse {
    fn default() -> Self {
        Self {
            channels: [ChannelState::default(); NUM_CHANNELS],
            dirty: AtomicBool::new(false),
        }
    }
}

impl PriorityUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, channel: u16, value: u8, priority: SourcePriority) {
        let Some(ch) = self.channels.get_mut(channel as usize) else {
            return;
        };
        let idx = priority.index();
        ch.values[idx] = value;
        ch.active[idx] = true;
        self.dirty.store(true, Ordering::Relaxed);
    }

    pub fn clear_priority(&mut self, priority: SourcePriority) {
        let idx = priority.index();
        for ch in &mut self.channels {
            ch.active[idx] = false;
            ch.values[idx] = 0;
        }
        self.dirty.store(true, Ordering::Relaxed);
    }

    pub fn blackout(&mut self) {
        for ch in &mut self.channels {
            *ch = ChannelState::default();
        }
        self.dirty.store(true, Ordering::Relaxed);
    }

    pub fn output_value(&self, channel: u16) -> u8 {
        self.channels
            .get(channel as usize)
            .map(ChannelState::merge)
            .unwrap_or(0)
    }

    pub fn output(&self) -> [u8; NUM_CHANNELS] {
        let mut out = [0u8; NUM_CHANNELS];
        for (i, ch) in self.channels.iter().enumerate() {
            out[i] = ch.merge();
        }
        out
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Relaxed)
    }

    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_override_and_reveal() {
        let mut u = PriorityUniverse::new();
        u.set(0, 100, SourcePriority::Scene);
        u.set(0, 200, SourcePriority::Programmer);
        assert_eq!(u.output_value(0), 200);

        u.clear_priority(SourcePriority::Programmer);
        assert_eq!(u.output_value(0), 100);
    }

    #[test]
    fn no_active_slot_yields_zero() {
        let u = PriorityUniverse::new();
        assert_eq!(u.output_value(0), 0);
        assert_eq!(u.output(), [0u8; NUM_CHANNELS]);
    }

    #[test]
    fn out_of_range_channel_is_a_no_op() {
        let mut u = PriorityUniverse::new();
        u.set(512, 77, SourcePriority::Programmer);
        assert!(!u.is_dirty());
        assert_eq!(u.output_value(512), 0);
        assert_eq!(u.output_value(9000), 0);
    }

    #[test]
    fn blackout_clears_every_channel_and_marks_dirty() {
        let mut u = PriorityUniverse::new();
        for ch in 0..NUM_CHANNELS as u16 {
            u.set(ch, 255, SourcePriority::Effect);
        }
        u.clear_dirty();
        u.blackout();
        assert_eq!(u.output(), [0u8; NUM_CHANNELS]);
        assert!(u.is_dirty());
    }

    #[test]
    fn dirty_flag_tracks_writes_not_reads() {
        let mut u = PriorityUniverse::new();
        assert!(!u.is_dirty());
        u.set(10, 1, SourcePriority::Background);
        assert!(u.is_dirty());
        let _ = u.output();
        assert!(u.is_dirty());
        u.clear_dirty();
        assert!(!u.is_dirty());
    }

    #[test]
    fn clear_priority_falls_through_to_next_highest() {
        let mut u = PriorityUniverse::new();
        u.set(5, 10, SourcePriority::Background);
        u.set(5, 20, SourcePriority::Scene);
        u.set(5, 30, SourcePriority::Programmer);
        u.clear_priority(SourcePriority::Programmer);
        assert_eq!(u.output_value(5), 20);
        u.clear_priority(SourcePriority::Scene);
        assert_eq!(u.output_value(5), 10);
    }
}
