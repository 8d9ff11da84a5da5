//! Capability contract for anything the [`crate::scheduler::OutputScheduler`] can send a
//! merged frame to.

use crate::universe::NUM_CHANNELS;

/// A transmission sink for merged DMX frames. Implementations are polymorphic; the
/// [`crate::device_manager::DeviceManager`] treats every device uniformly through this
/// trait rather than a concrete type.
pub trait OutputDevice: Send + Sync {
    /// Attempt to open the underlying transport. Returns `false` on failure; the device
    /// stays registered so a later retry can succeed.
    fn open(&self) -> bool;
    fn close(&self);
    fn is_open(&self) -> bool;
    /// Send a merged frame for `universe`. Must never block and must silently drop the
    /// frame if the device is closed or the send fails.
    fn send(&self, universe: u16, data: &[u8; NUM_CHANNELS]);
    fn type_name(&self) -> &'static str;
    fn description(&self) -> String;
}
