use super::state::{SessionSnapshot, SessionState};
use crate::advisory::AdvisoryNotifier;
use crate::camera::{configure_preview, CameraFactory, CameraResource, NegotiatedFormat};
use crate::config::PreviewSettings;
use crate::device::{self, DeviceFilter, DeviceId};
use crate::events::{EventBus, SessionEvent};
use crate::monitor::{ControlBlock, DeviceMonitor, MonitorEvent};
use crate::surface::{RenderTarget, SurfaceEvent, SurfaceTracker};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Owns the single external camera session.
///
/// Every handler that reads or mutates the session takes `inner` for its whole
/// critical section and never calls another locking handler while holding it.
/// Handlers never return errors: failures end in teardown or are ignored.
pub struct SessionStateMachine {
    inner: Mutex<SessionInner>,
    settings: PreviewSettings,
    filters: Vec<DeviceFilter>,
    monitor: Arc<dyn DeviceMonitor>,
    cameras: Arc<dyn CameraFactory>,
    surface: Arc<SurfaceTracker>,
    advisories: Arc<AdvisoryNotifier>,
    event_bus: EventBus,
    monitor_registered: AtomicBool,
    monitor_destroyed: AtomicBool,
}

struct SessionInner {
    state: SessionState,
    control_block: Option<Box<dyn ControlBlock>>,
    camera: Option<ActiveCamera>,
}

impl Default for SessionInner {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            control_block: None,
            camera: None,
        }
    }
}

struct ActiveCamera {
    resource: Box<dyn CameraResource>,
    session_id: Uuid,
    device: DeviceId,
    format: NegotiatedFormat,
}

impl SessionStateMachine {
    pub(super) fn new(
        settings: PreviewSettings,
        filters: Vec<DeviceFilter>,
        monitor: Arc<dyn DeviceMonitor>,
        cameras: Arc<dyn CameraFactory>,
        surface: Arc<SurfaceTracker>,
        advisories: Arc<AdvisoryNotifier>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            inner: Mutex::new(SessionInner::default()),
            settings,
            filters,
            monitor,
            cameras,
            surface,
            advisories,
            event_bus,
            monitor_registered: AtomicBool::new(false),
            monitor_destroyed: AtomicBool::new(false),
        }
    }

    /// Register for device events (host became active)
    pub fn start(&self) {
        if self.monitor_registered.swap(true, Ordering::AcqRel) {
            debug!("Device monitor already registered");
            return;
        }
        match self.monitor.register() {
            Ok(()) => info!("Device monitor registered"),
            Err(e) => {
                warn!("Failed to register device monitor: {}", e);
                self.monitor_registered.store(false, Ordering::Release);
            }
        }
    }

    /// Unregister from device events and release any session (host went to background)
    pub fn stop(&self) {
        if self.monitor_registered.swap(false, Ordering::AcqRel) {
            match self.monitor.unregister() {
                Ok(()) => info!("Device monitor unregistered"),
                Err(e) => warn!("Failed to unregister device monitor: {}", e),
            }
        }
        if self.teardown() {
            self.event_bus.notify(SessionEvent::camera_status(false, None));
        }
    }

    /// Stop, then free the device monitor for good (host is going away)
    pub fn destroy(&self) {
        self.stop();
        if !self.monitor_destroyed.swap(true, Ordering::AcqRel) {
            self.monitor.destroy();
            info!("Device monitor destroyed");
        }
    }

    pub fn handle_monitor_event(&self, event: MonitorEvent) {
        debug!("Monitor event: {:?}", event);
        match event {
            MonitorEvent::Attach { device } => self.on_attach(device),
            MonitorEvent::Detach { device } => self.on_detach(device),
            MonitorEvent::Connect {
                device,
                control_block,
            } => self.on_connect(device, control_block),
            MonitorEvent::Disconnect { device } => self.on_disconnect(device),
            MonitorEvent::Cancel { device } => self.on_cancel(device),
        }
    }

    pub fn handle_surface_event(&self, event: SurfaceEvent) {
        debug!("Surface event: {}", event.event_type());
        match event {
            SurfaceEvent::Available { target } => self.on_surface_available(target),
            SurfaceEvent::SizeChanged { width, height } => {
                self.on_surface_size_changed(width, height)
            }
            SurfaceEvent::Destroyed => self.on_surface_destroyed(),
        }
    }

    /// Device plugged in: show the hints and ask for permission
    pub fn on_attach(&self, device: DeviceId) {
        if !device::is_accepted(&self.filters, &device) {
            debug!("Ignoring attach of filtered device: {}", device);
            return;
        }

        info!("USB device attached: {}", device);
        self.advisories.notify_platform_quirk_hint();
        self.advisories.notify_power_hint();

        info!(
            "Requesting USB permission for exclusive access to {} over the internal camera",
            device
        );
        self.event_bus
            .notify(SessionEvent::PermissionRequested { device });
        if let Err(e) = self.monitor.request_permission(&device) {
            warn!("Permission request for {} failed: {}", device, e);
        }
    }

    pub fn on_detach(&self, device: DeviceId) {
        info!("USB device detached: {}", device);
        self.release_for(device);
    }

    pub fn on_disconnect(&self, device: DeviceId) {
        info!("USB device disconnected: {}", device);
        self.release_for(device);
    }

    pub fn on_cancel(&self, device: DeviceId) {
        warn!("USB permission request cancelled for device: {}", device);
        self.event_bus
            .notify(SessionEvent::PermissionCancelled { device });
    }

    /// Permission granted: replace any existing session with one on `control_block`
    pub fn on_connect(&self, device: DeviceId, control_block: Box<dyn ControlBlock>) {
        info!("USB device connected: {}", device);
        let mut inner = self.inner.lock();
        self.teardown_locked(&mut inner);

        inner.state = SessionState::Opening;
        let mut resource = self.cameras.create();
        let opened = resource.open(control_block.as_ref());
        inner.control_block = Some(control_block);

        if let Err(e) = opened {
            error!("Unable to open USB camera {}: {}", device, e);
            resource.release();
            self.advisories.notify_power_hint();
            self.teardown_locked(&mut inner);
            return;
        }

        let format = configure_preview(resource.as_mut(), &self.settings);
        let session_id = Uuid::new_v4();
        info!(
            "Opened UVC camera {} as session {} ({})",
            device, session_id, format
        );

        inner.camera = Some(ActiveCamera {
            resource,
            session_id,
            device,
            format,
        });
        inner.state = SessionState::Open;

        self.event_bus.notify(SessionEvent::SessionOpened {
            session_id,
            device,
            format,
        });
        self.event_bus
            .notify(SessionEvent::camera_status(true, Some(device)));

        self.start_stream_locked(&mut inner);
    }

    pub fn on_surface_available(&self, target: RenderTarget) {
        self.surface.set_available(target);
        let mut inner = self.inner.lock();
        match inner.state {
            SessionState::Open => {
                self.start_stream_locked(&mut inner);
            }
            SessionState::Streaming => debug!("Surface available while already streaming"),
            SessionState::Idle | SessionState::Opening => {
                debug!("Surface available: camera not ready yet")
            }
        }
    }

    /// The renderer scales the preview; a size change only retries a pending start
    pub fn on_surface_size_changed(&self, width: u32, height: u32) {
        self.surface.resize(width, height);
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Open {
            self.start_stream_locked(&mut inner);
        }
    }

    /// Stop frames but keep the camera and control block; surfaces come and go
    pub fn on_surface_destroyed(&self) {
        self.surface.clear();
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Streaming {
            return;
        }

        if let Some(active) = inner.camera.as_mut() {
            if let Err(e) = active.resource.stop_stream() {
                warn!("Failed to stop preview while destroying surface: {}", e);
            }
            self.event_bus.notify(SessionEvent::StreamingStopped {
                session_id: active.session_id,
                timestamp: Utc::now(),
            });
        }
        inner.state = SessionState::Open;
    }

    /// Release the session if one exists. Returns whether anything was released.
    pub fn teardown(&self) -> bool {
        let mut inner = self.inner.lock();
        self.teardown_locked(&mut inner)
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn is_streaming(&self) -> bool {
        self.state() == SessionState::Streaming
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.inner.lock().camera.as_ref().map(|active| active.session_id)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        let active = inner.camera.as_ref();
        SessionSnapshot {
            state: inner.state,
            session_id: active.map(|a| a.session_id),
            device: active.map(|a| a.device),
            format: active.map(|a| a.format),
            holds_control_block: inner.control_block.is_some(),
            surface_ready: self.surface.is_ready(),
            monitor_registered: self.monitor_registered.load(Ordering::Acquire),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn surface(&self) -> &Arc<SurfaceTracker> {
        &self.surface
    }

    pub fn advisories(&self) -> &Arc<AdvisoryNotifier> {
        &self.advisories
    }

    fn release_for(&self, device: DeviceId) {
        let released = self.teardown();
        if released {
            debug!("Released session after loss of {}", device);
        }
        self.event_bus
            .notify(SessionEvent::camera_status(false, Some(device)));
    }

    /// Bind the ready surface and start frames. Requires `Open`; a failure
    /// leaves the session `Open` so the next surface event can retry.
    fn start_stream_locked(&self, inner: &mut SessionInner) -> bool {
        if inner.state != SessionState::Open {
            debug!("Start preview: session is {}", inner.state);
            return false;
        }
        let Some(target) = self.surface.current_target() else {
            debug!("Start preview: render surface not yet available");
            return false;
        };
        let Some(active) = inner.camera.as_mut() else {
            debug!("Start preview: camera not ready yet");
            return false;
        };

        let started = active
            .resource
            .bind_render_target(&target)
            .and_then(|()| active.resource.start_stream());

        match started {
            Ok(()) => {
                info!(
                    "USB camera preview started for session {} on surface {}",
                    active.session_id, target.id
                );
                self.event_bus.notify(SessionEvent::StreamingStarted {
                    session_id: active.session_id,
                    timestamp: Utc::now(),
                });
                inner.state = SessionState::Streaming;
                true
            }
            Err(e) => {
                error!("Failed to start USB camera preview: {}", e);
                self.advisories.notify_power_hint();
                false
            }
        }
    }

    /// Stop, close and release everything held. Each step runs regardless of
    /// earlier failures; the session always ends `Idle` with no references.
    fn teardown_locked(&self, inner: &mut SessionInner) -> bool {
        let mut released = false;

        if let Some(mut active) = inner.camera.take() {
            if inner.state == SessionState::Streaming {
                if let Err(e) = active.resource.stop_stream() {
                    warn!("Error while stopping preview during release: {}", e);
                }
                self.event_bus.notify(SessionEvent::StreamingStopped {
                    session_id: active.session_id,
                    timestamp: Utc::now(),
                });
            }
            if let Err(e) = active.resource.close() {
                warn!("Error while closing camera: {}", e);
            }
            active.resource.release();

            info!("Session {} on {} released", active.session_id, active.device);
            self.event_bus.notify(SessionEvent::SessionClosed {
                session_id: active.session_id,
            });
            released = true;
        }

        if let Some(mut control_block) = inner.control_block.take() {
            if let Err(e) = control_block.close() {
                warn!(
                    "Error while closing control block for {}: {}",
                    control_block.device(),
                    e
                );
            }
            released = true;
        }

        inner.state = SessionState::Idle;
        released
    }
}

impl Drop for SessionStateMachine {
    fn drop(&mut self) {
        let mut inner = std::mem::take(self.inner.get_mut());
        if self.teardown_locked(&mut inner) {
            debug!("Session released on shutdown");
        }
    }
}
