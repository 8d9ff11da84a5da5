//! The realtime paced thread that samples merged frames and fans them out to devices.

use crate::device_manager::DeviceManager;
use crate::merge_buffer::MergeBuffer;
use crate::universe::NUM_CHANNELS;
use crate::util::{set_realtime_priority_if, BarrierFlag};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_REFRESH_HZ: f64 = 44.0;

/// Drift-free, paced output loop. Samples [`MergeBuffer::try_get_output`] for every
/// universe each tick and forwards the result (or the last known good frame, on writer
/// contention) to every open device registered for that universe.
pub struct OutputScheduler {
    merge_buffer: Arc<MergeBuffer>,
    device_manager: Arc<DeviceManager>,
    running: Arc<BarrierFlag>,
    refresh_hz_bits: Arc<AtomicU64>,
    rt_priority: Option<i32>,
    thread: Option<thread::JoinHandle<()>>,
}

impl OutputScheduler {
    pub fn new(merge_buffer: Arc<MergeBuffer>, device_manager: Arc<DeviceManager>) -> Self {
        Self {
            merge_buffer,
            device_manager,
            running: Arc::new(BarrierFlag::default()),
            refresh_hz_bits: Arc::new(AtomicU64::new(DEFAULT_REFRESH_HZ.to_bits())),
            rt_priority: None,
            thread: None,
        }
    }

    /// Best-effort Linux `SCHED_FIFO` priority requested when the thread starts.
    pub fn with_rt_priority(mut self, priority: Option<i32>) -> Self {
        self.rt_priority = priority;
        self
    }

    pub fn set_refresh_rate(&self, hz: f64) {
        self.refresh_hz_bits.store(hz.to_bits(), Ordering::Relaxed);
    }

    pub fn refresh_rate(&self) -> f64 {
        f64::from_bits(self.refresh_hz_bits.load(Ordering::Relaxed))
    }

    pub fn is_running(&self) -> bool {
        self.running.is_raised()
    }

    pub fn start(&mut self) -> anyhow::Result<()> {
        if self.running.swap_raise() {
            return Ok(());
        }
        let merge_buffer = self.merge_buffer.clone();
        let device_manager = self.device_manager.clone();
        let running = self.running.clone();
        let refresh_hz_bits = self.refresh_hz_bits.clone();
        let rt_priority = self.rt_priority;
        self.thread = Some(
            thread::Builder::new()
                .name("output-scheduler".into())
                .spawn(move || run(&merge_buffer, &device_manager, &running, &refresh_hz_bits, rt_priority))?,
        );
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
        log::info!("output scheduler stopped");
    }
}

impl Drop for OutputScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    merge_buffer: &MergeBuffer,
    device_manager: &DeviceManager,
    running: &BarrierFlag,
    refresh_hz_bits: &AtomicU64,
    rt_priority: Option<i32>,
) {
    set_realtime_priority_if(rt_priority);
    log::info!(
        "output scheduler started at {:.0} Hz",
        f64::from_bits(refresh_hz_bits.load(Ordering::Relaxed))
    );

    let universe_count = merge_buffer.universe_count();
    let mut last_frames: Vec<[u8; NUM_CHANNELS]> =
        vec![[0u8; NUM_CHANNELS]; universe_count as usize];

    let mut next_tick = Instant::now();
    while running.is_raised() {
        let hz = f64::from_bits(refresh_hz_bits.load(Ordering::Relaxed));
        let interval = Duration::from_secs_f64(1.0 / hz);
        next_tick += interval;

        for u in 0..universe_count {
            let idx = u as usize;
            let mut frame = last_frames[idx];
            if merge_buffer.try_get_output(u, &mut frame) {
                last_frames[idx] = frame;
            }

            for device in device_manager.devices_for_universe(u) {
                if device.is_open() {
                    device.send(u, &last_frames[idx]);
                }
            }
        }

        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        } else {
            // Fell behind; resync instead of accumulating a growing backlog of ticks.
            next_tick = now;
        }
    }
    log::info!("output scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::OutputDevice;
    use crate::priority::SourcePriority;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration as StdDuration;

    struct CountingDevice {
        count: AtomicUsize,
        last: Mutex<[u8; NUM_CHANNELS]>,
    }

    impl CountingDevice {
        fn new() -> Self {
            Self {
                count: AtomicUsize::new(0),
                last: Mutex::new([0u8; NUM_CHANNELS]),
            }
        }
    }

    impl OutputDevice for CountingDevice {
        fn open(&self) -> bool {
            true
        }
        fn close(&self) {}
        fn is_open(&self) -> bool {
            true
        }
        fn send(&self, _universe: u16, data: &[u8; NUM_CHANNELS]) {
            self.count.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = *data;
        }
        fn type_name(&self) -> &'static str {
            "counting"
        }
        fn description(&self) -> String {
            "counting test device".into()
        }
    }

    #[test]
    fn emits_at_approximately_the_configured_rate() {
        let mb = Arc::new(MergeBuffer::new(1));
        let dm = Arc::new(DeviceManager::new());
        let device = Arc::new(CountingDevice::new());
        dm.add(device.clone(), 0);

        let mut sched = OutputScheduler::new(mb, dm);
        sched.set_refresh_rate(100.0);
        sched.start().unwrap();
        thread::sleep(StdDuration::from_millis(220));
        sched.stop();

        let count = device.count.load(Ordering::SeqCst);
        // ~22 ticks expected at 100 Hz over 220 ms; allow generous slack for CI jitter.
        assert!(count >= 10 && count <= 40, "unexpected tick count: {count}");
    }

    #[test]
    fn falls_back_to_last_known_frame_under_writer_contention() {
        let mb = Arc::new(MergeBuffer::new(1));
        mb.set_value(0, 0, 42, SourcePriority::Programmer);

        let dm = Arc::new(DeviceManager::new());
        let device = Arc::new(CountingDevice::new());
        dm.add(device.clone(), 0);

        let mut sched = OutputScheduler::new(mb.clone(), dm);
        sched.set_refresh_rate(200.0);
        sched.start().unwrap();
        thread::sleep(StdDuration::from_millis(30));

        let held = mb.hold_write_lock_for_test();
        thread::sleep(StdDuration::from_millis(50));
        drop(held);

        thread::sleep(StdDuration::from_millis(30));
        sched.stop();

        assert_eq!(device.last.lock().unwrap()[0], 42);
    }

    #[test]
    fn start_is_idempotent() {
        let mb = Arc::new(MergeBuffer::new(1));
        let dm = Arc::new(DeviceManager::new());
        let mut sched = OutputScheduler::new(mb, dm);
        sched.start().unwrap();
        assert!(sched.is_running());
        sched.start().unwrap();
        sched.stop();
        assert!(!sched.is_running());
        sched.stop();
    }
}
