//! Owns and sequences every long-running component.

use crate::action::ActionQueue;
use crate::artnet::ArtNetSender;
use crate::broadcaster::StateBroadcaster;
use crate::config::AppConfig;
use crate::device::OutputDevice;
use crate::device_manager::DeviceManager;
use crate::engine::EngineLoop;
use crate::merge_buffer::MergeBuffer;
use crate::scheduler::OutputScheduler;
use anyhow::Result;
use std::sync::Arc;

/// Top-level process state. Construction wires every component together; `start`/`stop`
/// bring the threads up and down in the order the output pipeline depends on.
pub struct Application {
    pub merge_buffer: Arc<MergeBuffer>,
    pub action_queue: Arc<ActionQueue>,
    pub device_manager: Arc<DeviceManager>,
    pub broadcaster: StateBroadcaster,
    engine_loop: EngineLoop,
    scheduler: OutputScheduler,
}

impl Application {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let merge_buffer = Arc::new(MergeBuffer::new(config.general.universe_count));
        let action_queue = Arc::new(ActionQueue::new());
        let device_manager = Arc::new(DeviceManager::new());

        let scheduler = OutputScheduler::new(merge_buffer.clone(), device_manager.clone())
            .with_rt_priority(config.general.rt_priority);
        scheduler.set_refresh_rate(config.output.hz);

        let broadcaster = StateBroadcaster::new(merge_buffer.clone(), config.broadcast.hz);
        let engine_loop = EngineLoop::new(merge_buffer.clone(), action_queue.clone());

        let app = Self {
            merge_buffer,
            action_queue,
            device_manager,
            broadcaster,
            engine_loop,
            scheduler,
        };
        app.setup_devices(config)?;
        Ok(app)
    }

    fn setup_devices(&self, config: &AppConfig) -> Result<()> {
        if config.devices.is_empty() {
            let artnet: Arc<dyn OutputDevice> =
                Arc::new(ArtNetSender::new(&config.artnet.target_ip, config.artnet.port)?);
            for u in 0..config.general.universe_count {
                self.device_manager.add(artnet.clone(), u);
            }
            return Ok(());
        }
        for device_cfg in &config.devices {
            let device: Arc<dyn OutputDevice> =
                Arc::new(ArtNetSender::new(&config.artnet.target_ip, config.artnet.port)?);
            self.device_manager.add(device, device_cfg.universe);
        }
        Ok(())
    }

    /// Brings up devices, then the engine loop, the output scheduler, and the state
    /// broadcaster — the exact reverse of `stop`'s shutdown order.
    pub fn start(&mut self) -> Result<()> {
        self.device_manager.open_all();
        self.engine_loop.start()?;
        self.scheduler.start()?;
        self.broadcaster.start()?;
        log::info!(
            "engine running: {} universes, {:.0} Hz output",
            self.merge_buffer.universe_count(),
            self.scheduler.refresh_rate()
        );
        Ok(())
    }

    /// Reverse of `start`: broadcaster, scheduler, engine loop, then devices closed.
    pub fn stop(&mut self) {
        log::info!("shutting down...");
        self.broadcaster.stop();
        self.scheduler.stop();
        self.engine_loop.stop();
        self.device_manager.close_all();
        log::info!("shutdown complete");
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        self.stop();
    }
}
