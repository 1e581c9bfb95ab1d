//! Boundary of the USB device monitor.
//!
//! The monitor enumerates the bus, shows the permission prompt and hands over a
//! [`ControlBlock`] once access is granted. The session state machine only
//! consumes its events and issues the three commands below.

use crate::device::DeviceId;
use crate::error::MonitorError;
use std::fmt;

/// Exclusive low-level access to one physical device instance
pub trait ControlBlock: Send {
    /// Device this block grants access to
    fn device(&self) -> DeviceId;

    /// Release bus access. Called exactly once by the owner.
    fn close(&mut self) -> Result<(), MonitorError>;
}

/// Commands accepted by the device monitor
pub trait DeviceMonitor: Send + Sync {
    /// Start delivering hotplug events
    fn register(&self) -> Result<(), MonitorError>;

    /// Stop delivering hotplug events
    fn unregister(&self) -> Result<(), MonitorError>;

    /// Ask the user for access to an attached device
    fn request_permission(&self, device: &DeviceId) -> Result<(), MonitorError>;

    /// Free the monitor for good. No events are delivered afterwards.
    fn destroy(&self);
}

/// Events delivered by the device monitor from its own execution context
pub enum MonitorEvent {
    /// Device plugged in, no permission yet
    Attach { device: DeviceId },
    /// Device unplugged
    Detach { device: DeviceId },
    /// Permission granted, bus access handed over
    Connect {
        device: DeviceId,
        control_block: Box<dyn ControlBlock>,
    },
    /// Bus access lost for a previously connected device. The control block
    /// was handed over on connect and is closed by the session that owns it.
    Disconnect { device: DeviceId },
    /// User declined the permission prompt
    Cancel { device: DeviceId },
}

impl MonitorEvent {
    pub fn device(&self) -> DeviceId {
        match self {
            MonitorEvent::Attach { device }
            | MonitorEvent::Detach { device }
            | MonitorEvent::Connect { device, .. }
            | MonitorEvent::Disconnect { device }
            | MonitorEvent::Cancel { device } => *device,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            MonitorEvent::Attach { .. } => "attach",
            MonitorEvent::Detach { .. } => "detach",
            MonitorEvent::Connect { .. } => "connect",
            MonitorEvent::Disconnect { .. } => "disconnect",
            MonitorEvent::Cancel { .. } => "cancel",
        }
    }
}

impl fmt::Debug for MonitorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MonitorEvent::{}({})", self.event_type(), self.device())
    }
}
