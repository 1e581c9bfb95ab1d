use crate::device::DeviceId;
use crate::error::MonitorError;
use crate::monitor::{ControlBlock, DeviceMonitor, MonitorEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Hands out simulated control blocks and remembers how often each was closed
#[derive(Debug, Default)]
pub struct ControlBlockLedger {
    blocks: Mutex<Vec<Arc<AtomicUsize>>>,
    fail_close: AtomicBool,
}

impl ControlBlockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn issue(self: &Arc<Self>, device: DeviceId) -> SimulatedControlBlock {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut blocks = self.blocks.lock();
        blocks.push(Arc::clone(&closes));
        SimulatedControlBlock {
            index: blocks.len() - 1,
            device,
            closes,
            fail_close: self.fail_close.load(Ordering::SeqCst),
        }
    }

    /// Blocks issued after this call report a failure from `close`
    pub fn set_fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    pub fn issued(&self) -> usize {
        self.blocks.lock().len()
    }

    /// Close count per issued block, in issue order
    pub fn close_counts(&self) -> Vec<usize> {
        self.blocks
            .lock()
            .iter()
            .map(|closes| closes.load(Ordering::SeqCst))
            .collect()
    }

    /// Blocks that have not been closed yet
    pub fn outstanding(&self) -> usize {
        self.close_counts().iter().filter(|c| **c == 0).count()
    }
}

#[derive(Debug)]
pub struct SimulatedControlBlock {
    index: usize,
    device: DeviceId,
    closes: Arc<AtomicUsize>,
    fail_close: bool,
}

impl ControlBlock for SimulatedControlBlock {
    fn device(&self) -> DeviceId {
        self.device
    }

    fn close(&mut self) -> Result<(), MonitorError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        debug!("Control block {} for {} closed", self.index, self.device);
        if self.fail_close {
            return Err(MonitorError::ControlBlockClose {
                details: "simulated close failure".to_string(),
            });
        }
        Ok(())
    }
}

/// What the simulated user does with a permission prompt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionResponse {
    /// Leave the prompt unanswered
    #[default]
    Ignore,
    /// Grant and deliver a connect event
    Grant,
    /// Decline and deliver a cancel event
    Deny,
}

/// In-process device monitor that answers permission prompts on its own
pub struct SimulatedDeviceMonitor {
    ledger: Arc<ControlBlockLedger>,
    events: Mutex<Option<mpsc::UnboundedSender<MonitorEvent>>>,
    response: Mutex<PermissionResponse>,
    registered: AtomicBool,
    fail_registration: AtomicBool,
    register_calls: AtomicUsize,
    unregister_calls: AtomicUsize,
    destroy_calls: AtomicUsize,
    permission_requests: Mutex<Vec<DeviceId>>,
}

impl SimulatedDeviceMonitor {
    /// Monitor that records commands and never emits events
    pub fn new(ledger: Arc<ControlBlockLedger>) -> Self {
        Self {
            ledger,
            events: Mutex::new(None),
            response: Mutex::new(PermissionResponse::Ignore),
            registered: AtomicBool::new(false),
            fail_registration: AtomicBool::new(false),
            register_calls: AtomicUsize::new(0),
            unregister_calls: AtomicUsize::new(0),
            destroy_calls: AtomicUsize::new(0),
            permission_requests: Mutex::new(Vec::new()),
        }
    }

    /// Monitor that answers permission prompts through `events`
    pub fn with_events(
        ledger: Arc<ControlBlockLedger>,
        events: mpsc::UnboundedSender<MonitorEvent>,
        response: PermissionResponse,
    ) -> Self {
        Self {
            events: Mutex::new(Some(events)),
            response: Mutex::new(response),
            ..Self::new(ledger)
        }
    }

    pub fn set_response(&self, response: PermissionResponse) {
        *self.response.lock() = response;
    }

    /// Make `register` and `unregister` fail from now on
    pub fn set_fail_registration(&self, fail: bool) {
        self.fail_registration.store(fail, Ordering::SeqCst);
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn unregister_calls(&self) -> usize {
        self.unregister_calls.load(Ordering::SeqCst)
    }

    pub fn destroy_calls(&self) -> usize {
        self.destroy_calls.load(Ordering::SeqCst)
    }

    pub fn permission_requests(&self) -> Vec<DeviceId> {
        self.permission_requests.lock().clone()
    }

    /// Deliver `event`. A connect that cannot be delivered closes its
    /// control block, since nobody else will.
    fn emit(&self, event: MonitorEvent) -> Result<(), MonitorError> {
        let events = self.events.lock();
        let Some(events) = events.as_ref() else {
            return Ok(());
        };
        match events.send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendError(undelivered)) => {
                if let MonitorEvent::Connect {
                    mut control_block, ..
                } = undelivered
                {
                    if let Err(e) = control_block.close() {
                        warn!("Failed to close undelivered control block: {}", e);
                    }
                }
                Err(MonitorError::PermissionRequest {
                    details: "event channel closed".to_string(),
                })
            }
        }
    }
}

impl DeviceMonitor for SimulatedDeviceMonitor {
    fn register(&self) -> Result<(), MonitorError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_registration.load(Ordering::SeqCst) {
            return Err(MonitorError::Register {
                details: "simulated register failure".to_string(),
            });
        }
        self.registered.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unregister(&self) -> Result<(), MonitorError> {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_registration.load(Ordering::SeqCst) {
            return Err(MonitorError::Unregister {
                details: "simulated unregister failure".to_string(),
            });
        }
        self.registered.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn request_permission(&self, device: &DeviceId) -> Result<(), MonitorError> {
        self.permission_requests.lock().push(*device);
        let response = *self.response.lock();
        info!("Simulated permission prompt for {}: {:?}", device, response);
        if self.events.lock().is_none() {
            debug!("No event channel, leaving the prompt for {} unanswered", device);
            return Ok(());
        }

        match response {
            PermissionResponse::Ignore => Ok(()),
            PermissionResponse::Grant => self.emit(MonitorEvent::Connect {
                device: *device,
                control_block: Box::new(self.ledger.issue(*device)),
            }),
            PermissionResponse::Deny => self.emit(MonitorEvent::Cancel { device: *device }),
        }
    }

    fn destroy(&self) {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        self.registered.store(false, Ordering::SeqCst);
        self.events.lock().take();
        debug!("Simulated device monitor destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceId {
        DeviceId::new(0x046d, 0x085e)
    }

    #[test]
    fn test_grant_delivers_connect() {
        let ledger = ControlBlockLedger::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let monitor =
            SimulatedDeviceMonitor::with_events(Arc::clone(&ledger), tx, PermissionResponse::Grant);

        monitor.request_permission(&device()).unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event_type(), "connect");
        assert_eq!(event.device(), device());
        assert_eq!(ledger.issued(), 1);
        assert_eq!(ledger.outstanding(), 1);
    }

    #[test]
    fn test_undelivered_connect_closes_control_block() {
        let ledger = ControlBlockLedger::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let monitor =
            SimulatedDeviceMonitor::with_events(Arc::clone(&ledger), tx, PermissionResponse::Grant);
        drop(rx);

        let result = monitor.request_permission(&device());

        assert!(matches!(result, Err(MonitorError::PermissionRequest { .. })));
        assert_eq!(ledger.close_counts(), vec![1]);
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn test_destroy_stops_event_delivery() {
        let ledger = ControlBlockLedger::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let monitor =
            SimulatedDeviceMonitor::with_events(Arc::clone(&ledger), tx, PermissionResponse::Grant);

        monitor.destroy();
        monitor.request_permission(&device()).unwrap();

        assert_eq!(monitor.destroy_calls(), 1);
        assert!(rx.try_recv().is_err());
        assert_eq!(ledger.issued(), 0);
    }

    #[test]
    fn test_registration_failures() {
        let monitor = SimulatedDeviceMonitor::new(ControlBlockLedger::new());
        monitor.set_fail_registration(true);

        assert!(matches!(monitor.register(), Err(MonitorError::Register { .. })));
        assert!(!monitor.is_registered());
        assert!(matches!(monitor.unregister(), Err(MonitorError::Unregister { .. })));
        assert_eq!(monitor.register_calls(), 1);
        assert_eq!(monitor.unregister_calls(), 1);
    }
}
