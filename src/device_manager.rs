//! Registry mapping universes to the output devices that serve them.

use crate::device::OutputDevice;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

struct DeviceAssignment {
    id: String,
    device: Arc<dyn OutputDevice>,
    universe: u16,
}

/// Concurrent registry of device assignments. `devices_for_universe` hands back an owned
/// `Vec<Arc<dyn OutputDevice>>` so the [`crate::scheduler::OutputScheduler`] never holds
/// the registry lock while doing I/O, and a concurrent `remove` can't pull a device out
/// from under an in-flight send.
#[derive(Default)]
pub struct DeviceManager {
    assignments: RwLock<Vec<DeviceAssignment>>,
    next_id: AtomicU32,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            assignments: RwLock::new(Vec::new()),
            next_id: AtomicU32::new(1),
        }
    }

    pub fn add(&self, device: Arc<dyn OutputDevice>, universe: u16) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = format!("dev_{n}");

        if device.open() {
            log::info!(
                "device added: {id} [{}] on universe {universe}",
                device.description()
            );
        } else {
            log::warn!("device {id} failed to open: {}", device.description());
        }

        self.assignments.write().unwrap().push(DeviceAssignment {
            id: id.clone(),
            device,
            universe,
        });
        id
    }

    pub fn remove(&self, id: &str) {
        let mut guard = self.assignments.write().unwrap();
        if let Some(pos) = guard.iter().position(|a| a.id == id) {
            let assignment = guard.remove(pos);
            assignment.device.close();
            log::info!("device removed: {id}");
        }
    }

    pub fn devices_for_universe(&self, universe: u16) -> Vec<Arc<dyn OutputDevice>> {
        self.assignments
            .read()
            .unwrap()
            .iter()
            .filter(|a| a.universe == universe)
            .map(|a| a.device.clone())
            .collect()
    }

    pub fn open_all(&self) {
        for a in self.assignments.read().unwrap().iter() {
            a.device.open();
        }
    }

    pub fn close_all(&self) {
        for a in self.assignments.read().unwrap().iter() {
            a.device.close();
        }
    }
}
