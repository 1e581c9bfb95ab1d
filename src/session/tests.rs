use super::*;
use crate::advisory::{Advisory, NoticeSink};
use crate::camera::{NegotiatedFormat, PreviewFormat};
use crate::config::PreviewConfig;
use crate::device::{DeviceFilter, DeviceId};
use crate::events::{EventFilter, EventReceiver, SessionEvent};
use crate::monitor::MonitorEvent;
use crate::simulated::{
    CameraFaults, CameraProbe, ControlBlockLedger, FaultKind, SimulatedCameraFactory,
    SimulatedDeviceMonitor,
};
use crate::surface::{RenderTarget, SurfaceEvent};
use parking_lot::Mutex;
use std::sync::{Arc, Barrier};
use std::thread;

#[derive(Default)]
struct RecordingSink {
    shown: Mutex<Vec<Advisory>>,
}

impl RecordingSink {
    fn count(&self, advisory: Advisory) -> usize {
        self.shown.lock().iter().filter(|a| **a == advisory).count()
    }
}

impl NoticeSink for RecordingSink {
    fn show(&self, advisory: Advisory, _message: &str) {
        self.shown.lock().push(advisory);
    }
}

struct Harness {
    machine: Arc<SessionStateMachine>,
    ledger: Arc<ControlBlockLedger>,
    monitor: Arc<SimulatedDeviceMonitor>,
    cameras: SimulatedCameraFactory,
    probe: Arc<CameraProbe>,
    notices: Arc<RecordingSink>,
}

fn device() -> DeviceId {
    DeviceId::new(0x046d, 0x085e)
}

fn target() -> RenderTarget {
    RenderTarget::new(1, 1280, 800)
}

fn harness_with(config: PreviewConfig, faults: CameraFaults) -> Harness {
    let ledger = ControlBlockLedger::new();
    let monitor = Arc::new(SimulatedDeviceMonitor::new(Arc::clone(&ledger)));
    let cameras = SimulatedCameraFactory::with_faults(faults);
    let notices = Arc::new(RecordingSink::default());

    let machine = SessionStateMachineBuilder::new()
        .config(config)
        .monitor(monitor.clone())
        .cameras(Arc::new(cameras.clone()))
        .notice_sink(notices.clone())
        .build()
        .unwrap();

    Harness {
        machine: Arc::new(machine),
        probe: cameras.probe(),
        ledger,
        monitor,
        cameras,
        notices,
    }
}

fn harness() -> Harness {
    harness_with(PreviewConfig::default(), CameraFaults::default())
}

impl Harness {
    fn connect(&self) {
        let block = self.ledger.issue(device());
        self.machine.on_connect(device(), Box::new(block));
    }

    fn count(&self, counter: &std::sync::atomic::AtomicUsize) -> usize {
        CameraProbe::count(counter)
    }

    fn events(&self) -> EventReceiver {
        self.machine
            .event_bus()
            .subscribe_filtered(EventFilter::All, "test")
    }
}

#[test]
fn test_builder_requires_collaborators() {
    let result = SessionStateMachineBuilder::new().build();
    match result {
        Err(crate::error::UvcPreviewError::System { message }) => {
            assert!(message.contains("Device monitor must be specified"));
        }
        _ => panic!("Expected system error for missing monitor"),
    }
}

#[test]
fn test_initial_state_is_idle() {
    let h = harness();
    let snapshot = h.machine.snapshot();
    assert_eq!(snapshot.state, SessionState::Idle);
    assert!(!snapshot.holds_control_block);
    assert!(snapshot.session_id.is_none());
}

#[test]
fn test_last_connect_wins() {
    let h = harness();

    for n in 1..=5 {
        h.connect();
        assert_eq!(h.machine.state(), SessionState::Open);
        assert_eq!(h.count(&h.probe.opens), n);
        assert_eq!(h.count(&h.probe.live), 1);
    }

    // Every earlier session was fully torn down exactly once
    assert_eq!(h.count(&h.probe.closes), 4);
    assert_eq!(h.count(&h.probe.releases), 4);
    assert_eq!(h.ledger.close_counts(), vec![1, 1, 1, 1, 0]);
    assert_eq!(h.count(&h.probe.max_live), 1);

    let snapshot = h.machine.snapshot();
    assert!(snapshot.holds_control_block);
    assert_eq!(snapshot.device, Some(device()));
}

#[test]
fn test_teardown_is_idempotent() {
    let h = harness();
    h.machine.on_surface_available(target());
    h.connect();
    assert_eq!(h.machine.state(), SessionState::Streaming);

    assert!(h.machine.teardown());
    assert!(!h.machine.teardown());
    assert!(!h.machine.teardown());

    assert_eq!(h.count(&h.probe.stops), 1);
    assert_eq!(h.count(&h.probe.closes), 1);
    assert_eq!(h.count(&h.probe.releases), 1);
    assert_eq!(h.ledger.close_counts(), vec![1]);
    assert_eq!(h.machine.state(), SessionState::Idle);
}

#[test]
fn test_teardown_without_session_is_noop() {
    let h = harness();
    assert!(!h.machine.teardown());
    h.machine.on_disconnect(device());
    h.machine.on_detach(device());
    assert_eq!(h.machine.state(), SessionState::Idle);
    assert_eq!(h.count(&h.probe.closes), 0);
}

#[test]
fn test_connect_then_surface_streams() {
    let h = harness();
    h.connect();
    assert_eq!(h.machine.state(), SessionState::Open);

    h.machine.on_surface_available(target());
    assert_eq!(h.machine.state(), SessionState::Streaming);
    assert_eq!(h.count(&h.probe.starts), 1);
}

#[test]
fn test_surface_then_connect_streams() {
    let h = harness();
    h.machine.on_surface_available(target());
    assert_eq!(h.machine.state(), SessionState::Idle);

    h.connect();
    assert_eq!(h.machine.state(), SessionState::Streaming);
    assert_eq!(h.count(&h.probe.binds), 1);
}

#[test]
fn test_connect_without_surface_stays_open() {
    let h = harness();
    h.connect();
    assert_eq!(h.machine.state(), SessionState::Open);
    assert_eq!(h.count(&h.probe.starts), 0);
}

#[test]
fn test_surface_without_connect_stays_idle() {
    let h = harness();
    h.machine.on_surface_available(target());
    h.machine.on_surface_size_changed(640, 480);
    assert_eq!(h.machine.state(), SessionState::Idle);
    assert!(h.machine.snapshot().surface_ready);
    assert_eq!(h.count(&h.probe.created), 0);
}

#[test]
fn test_surface_destroy_keeps_session() {
    let h = harness();
    h.machine.on_surface_available(target());
    h.connect();
    let session_id = h.machine.session_id();
    assert_eq!(h.machine.state(), SessionState::Streaming);

    h.machine.on_surface_destroyed();
    assert_eq!(h.machine.state(), SessionState::Open);
    assert_eq!(h.count(&h.probe.stops), 1);
    assert_eq!(h.count(&h.probe.closes), 0);
    assert_eq!(h.ledger.outstanding(), 1);
    assert!(h.machine.snapshot().holds_control_block);

    h.machine.on_surface_available(RenderTarget::new(2, 1280, 800));
    assert_eq!(h.machine.state(), SessionState::Streaming);
    assert_eq!(h.machine.session_id(), session_id);
    assert_eq!(h.count(&h.probe.opens), 1);
}

#[test]
fn test_surface_destroy_when_open_is_noop() {
    let h = harness();
    h.connect();
    h.machine.on_surface_destroyed();
    assert_eq!(h.machine.state(), SessionState::Open);
    assert_eq!(h.count(&h.probe.stops), 0);
}

#[test]
fn test_size_change_does_not_rebind() {
    let h = harness();
    h.machine.on_surface_available(target());
    h.connect();
    assert_eq!(h.count(&h.probe.binds), 1);

    h.machine.on_surface_size_changed(800, 1280);
    h.machine.on_surface_size_changed(1280, 800);
    assert_eq!(h.machine.state(), SessionState::Streaming);
    assert_eq!(h.count(&h.probe.binds), 1);
}

#[test]
fn test_format_fallback_keeps_session() {
    let faults = CameraFaults {
        rejected_formats: vec![PreviewFormat::hd_mjpeg()],
        ..CameraFaults::default()
    };
    let h = harness_with(PreviewConfig::default(), faults);
    h.connect();

    let snapshot = h.machine.snapshot();
    assert_eq!(snapshot.state, SessionState::Open);
    assert_eq!(
        snapshot.format,
        Some(NegotiatedFormat::Fallback(PreviewFormat::uvc_default()))
    );
    assert_eq!(
        *h.probe.applied_formats.lock(),
        vec![PreviewFormat::uvc_default()]
    );
}

#[test]
fn test_total_format_failure_is_not_fatal() {
    let faults = CameraFaults {
        rejected_formats: vec![PreviewFormat::hd_mjpeg(), PreviewFormat::uvc_default()],
        auto_focus_unsupported: true,
        ..CameraFaults::default()
    };
    let h = harness_with(PreviewConfig::default(), faults);
    h.connect();

    let snapshot = h.machine.snapshot();
    assert_eq!(snapshot.state, SessionState::Open);
    assert_eq!(snapshot.format, Some(NegotiatedFormat::Unconfigured));
    assert_eq!(h.notices.count(Advisory::PowerHint), 0);
}

#[test]
fn test_open_failure_returns_to_idle() {
    let faults = CameraFaults {
        open: Some(FaultKind::Power),
        ..CameraFaults::default()
    };
    let h = harness_with(PreviewConfig::default(), faults);
    h.machine.on_surface_available(target());
    h.connect();

    let snapshot = h.machine.snapshot();
    assert_eq!(snapshot.state, SessionState::Idle);
    assert!(!snapshot.holds_control_block);
    assert_eq!(h.ledger.close_counts(), vec![1]);
    assert_eq!(h.count(&h.probe.open_failures), 1);
    assert_eq!(h.count(&h.probe.releases), 1);
    assert_eq!(h.count(&h.probe.closes), 0);
    assert_eq!(h.notices.count(Advisory::PowerHint), 1);

    // A later connect with a healthy camera recovers
    h.cameras.set_faults(CameraFaults::default());
    h.connect();
    assert_eq!(h.machine.state(), SessionState::Streaming);
}

#[test]
fn test_stream_start_failure_is_retryable() {
    let faults = CameraFaults {
        start: Some(FaultKind::Format),
        ..CameraFaults::default()
    };
    let h = harness_with(PreviewConfig::default(), faults);
    h.machine.on_surface_available(target());
    h.connect();

    assert_eq!(h.machine.state(), SessionState::Open);
    assert!(h.machine.snapshot().holds_control_block);
    assert_eq!(h.notices.count(Advisory::PowerHint), 1);

    // Retried on the next qualifying event, advisory stays one-shot
    h.machine.on_surface_size_changed(640, 400);
    assert_eq!(h.machine.state(), SessionState::Open);
    assert_eq!(h.notices.count(Advisory::PowerHint), 1);
}

#[test]
fn test_teardown_failures_are_swallowed() {
    let faults = CameraFaults {
        stop: Some(FaultKind::Driver),
        close: Some(FaultKind::Busy),
        ..CameraFaults::default()
    };
    let h = harness_with(PreviewConfig::default(), faults);
    h.ledger.set_fail_close(true);
    h.machine.on_surface_available(target());
    h.connect();
    assert_eq!(h.machine.state(), SessionState::Streaming);

    h.machine.on_disconnect(device());

    assert_eq!(h.machine.state(), SessionState::Idle);
    assert_eq!(h.count(&h.probe.stops), 1);
    assert_eq!(h.count(&h.probe.closes), 1);
    assert_eq!(h.count(&h.probe.releases), 1);
    assert_eq!(h.ledger.close_counts(), vec![1]);

    // Next session opens normally
    h.connect();
    assert_eq!(h.machine.state(), SessionState::Streaming);
}

#[test]
fn test_attach_advisories_are_one_shot() {
    let h = harness();
    for _ in 0..10 {
        h.machine.on_attach(device());
    }

    assert_eq!(h.notices.count(Advisory::PowerHint), 1);
    assert_eq!(h.notices.count(Advisory::PlatformQuirkHint), 1);
    assert_eq!(h.monitor.permission_requests().len(), 10);
    assert_eq!(h.machine.state(), SessionState::Idle);
}

#[test]
fn test_filtered_device_is_ignored() {
    let mut config = PreviewConfig::default();
    config.device.filters = vec![DeviceFilter {
        vendor_id: 0x0bda,
        product_id: None,
    }];
    let h = harness_with(config, CameraFaults::default());

    h.machine.on_attach(device());
    assert!(h.monitor.permission_requests().is_empty());
    assert_eq!(h.notices.count(Advisory::PlatformQuirkHint), 0);

    h.machine.on_attach(DeviceId::new(0x0bda, 0x5830));
    assert_eq!(h.monitor.permission_requests().len(), 1);
}

#[test]
fn test_cancel_keeps_idle() {
    let h = harness();
    let mut events = h.events();
    h.machine.on_attach(device());
    h.machine.on_cancel(device());

    assert_eq!(h.machine.state(), SessionState::Idle);
    let types: Vec<_> = events.drain().iter().map(|e| e.event_type()).collect();
    assert_eq!(types, vec!["permission_requested", "permission_cancelled"]);
}

#[test]
fn test_detach_publishes_not_connected() {
    let h = harness();
    let mut events = h.events();
    h.connect();
    h.machine.handle_monitor_event(MonitorEvent::Detach { device: device() });

    let statuses: Vec<bool> = events
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::CameraStatusChanged { connected, .. } => Some(connected),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, vec![true, false]);
}

#[test]
fn test_surface_event_dispatch() {
    let h = harness();
    h.connect();
    h.machine
        .handle_surface_event(SurfaceEvent::Available { target: target() });
    assert!(h.machine.is_streaming());
    h.machine.handle_surface_event(SurfaceEvent::Destroyed);
    assert_eq!(h.machine.state(), SessionState::Open);
}

#[test]
fn test_start_stop_lifecycle() {
    let h = harness();
    h.machine.start();
    h.machine.start();
    assert!(h.monitor.is_registered());
    assert_eq!(h.monitor.register_calls(), 1);

    h.machine.on_surface_available(target());
    h.connect();
    assert!(h.machine.is_streaming());

    h.machine.stop();
    h.machine.stop();
    assert!(!h.monitor.is_registered());
    assert_eq!(h.monitor.unregister_calls(), 1);
    assert_eq!(h.machine.state(), SessionState::Idle);
    assert_eq!(h.ledger.outstanding(), 0);
    assert_eq!(h.count(&h.probe.releases), 1);
    assert_eq!(h.monitor.destroy_calls(), 0);
}

#[test]
fn test_destroy_releases_and_frees_monitor_once() {
    let h = harness();
    h.machine.start();
    h.connect();

    h.machine.destroy();
    h.machine.destroy();

    assert_eq!(h.monitor.unregister_calls(), 1);
    assert_eq!(h.monitor.destroy_calls(), 1);
    assert_eq!(h.machine.state(), SessionState::Idle);
    assert_eq!(h.ledger.close_counts(), vec![1]);
}

#[test]
fn test_registration_failures_are_swallowed() {
    let h = harness();
    h.monitor.set_fail_registration(true);
    h.machine.start();
    assert!(!h.machine.snapshot().monitor_registered);

    // Nothing registered, so nothing to unregister
    h.machine.stop();
    assert_eq!(h.monitor.unregister_calls(), 0);

    h.monitor.set_fail_registration(false);
    h.machine.start();
    assert!(h.machine.snapshot().monitor_registered);
    h.connect();

    h.monitor.set_fail_registration(true);
    h.machine.stop();
    assert_eq!(h.monitor.unregister_calls(), 1);
    assert!(!h.machine.snapshot().monitor_registered);
    assert_eq!(h.machine.state(), SessionState::Idle);
    assert_eq!(h.ledger.outstanding(), 0);
}

#[test]
fn test_drop_releases_session() {
    let h = harness();
    h.connect();
    let Harness {
        machine,
        ledger,
        probe,
        ..
    } = h;

    drop(machine);
    assert_eq!(ledger.close_counts(), vec![1]);
    assert_eq!(CameraProbe::count(&probe.releases), 1);
}

#[test]
fn test_disconnect_races_stream_start() {
    for _ in 0..200 {
        let h = harness();
        h.connect();

        let barrier = Arc::new(Barrier::new(2));
        let surface = {
            let machine = Arc::clone(&h.machine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                machine.on_surface_available(target());
            })
        };
        let disconnect = {
            let machine = Arc::clone(&h.machine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                machine.on_disconnect(device());
            })
        };
        surface.join().unwrap();
        disconnect.join().unwrap();

        assert_eq!(h.machine.state(), SessionState::Idle);
        assert_eq!(h.ledger.outstanding(), 0);
        assert_eq!(h.ledger.close_counts(), vec![1]);
        assert_eq!(h.count(&h.probe.releases), 1);
        assert_eq!(h.count(&h.probe.live), 0);
    }
}

#[test]
fn test_concurrent_connects_keep_one_session() {
    let h = harness();
    h.machine.on_surface_available(target());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let machine = Arc::clone(&h.machine);
            let ledger = Arc::clone(&h.ledger);
            thread::spawn(move || {
                for _ in 0..25 {
                    machine.on_connect(device(), Box::new(ledger.issue(device())));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(h.machine.state(), SessionState::Streaming);
    assert_eq!(h.count(&h.probe.max_live), 1);
    assert_eq!(h.count(&h.probe.live), 1);
    assert_eq!(h.ledger.issued(), 200);
    assert_eq!(h.ledger.outstanding(), 1);
    assert!(h.ledger.close_counts().iter().all(|c| *c <= 1));
}
