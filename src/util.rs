//! Small shared helpers used across the engine's long-running threads.

use std::sync::atomic::{AtomicBool, Ordering};

/// A flag raised once and checked many times — the shared idiom behind every loop's
/// start/stop lifecycle ([`crate::engine::EngineLoop`], [`crate::scheduler::OutputScheduler`],
/// [`crate::broadcaster::StateBroadcaster`]) and behind the process-wide Ctrl-C shutdown signal.
pub struct BarrierFlag(AtomicBool);

impl Default for BarrierFlag {
    fn default() -> Self {
        Self(AtomicBool::new(false))
    }
}

impl BarrierFlag {
    #[inline]
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn lower(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Atomically raises the flag, returning whether it was already raised. Used by
    /// idempotent `start()` methods: `if flag.swap_raise() { return; }`.
    #[inline]
    pub fn swap_raise(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst)
    }
}

/// Best-effort `SCHED_FIFO` request for the calling thread (Linux only; a no-op, logged,
/// elsewhere). Mirrors the original engine's `pthread_setschedparam(SCHED_FIFO)` call from
/// its output thread.
#[inline]
pub fn set_realtime_priority_if(priority: Option<i32>) {
    #[cfg(target_os = "linux")]
    if let Some(pri) = priority {
        unsafe {
            let param = libc::sched_param {
                sched_priority: pri,
            };
            if libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) != 0 {
                log::warn!(
                    "could not set real-time thread priority {pri} (run as root for RT scheduling)"
                );
            }
        }
    }
    #[cfg(not(target_os = "linux"))]
    if priority.is_some() {
        log::warn!("real-time scheduling requested but unsupported on this platform");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_raise_reports_previous_state() {
        let f = BarrierFlag::default();
        assert!(!f.swap_raise());
        assert!(f.swap_raise());
        assert!(f.is_raised());
        f.lower();
        assert!(!f.is_raised());
    }

    #[test]
    fn rt_priority_request_never_panics_without_root() {
        set_realtime_priority_if(Some(80));
        set_realtime_priority_if(None);
    }
}
