use super::machine::SessionStateMachine;
use crate::advisory::{AdvisoryNotifier, LogNoticeSink, NoticeSink};
use crate::camera::CameraFactory;
use crate::config::PreviewConfig;
use crate::error::{Result, UvcPreviewError};
use crate::events::EventBus;
use crate::monitor::DeviceMonitor;
use crate::surface::SurfaceTracker;
use std::sync::Arc;

/// Builder for the session state machine
pub struct SessionStateMachineBuilder {
    config: PreviewConfig,
    monitor: Option<Arc<dyn DeviceMonitor>>,
    cameras: Option<Arc<dyn CameraFactory>>,
    event_bus: Option<EventBus>,
    notice_sink: Option<Arc<dyn NoticeSink>>,
    surface: Option<Arc<SurfaceTracker>>,
}

impl SessionStateMachineBuilder {
    pub fn new() -> Self {
        Self {
            config: PreviewConfig::default(),
            monitor: None,
            cameras: None,
            event_bus: None,
            notice_sink: None,
            surface: None,
        }
    }

    pub fn config(mut self, config: PreviewConfig) -> Self {
        self.config = config;
        self
    }

    pub fn monitor(mut self, monitor: Arc<dyn DeviceMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn cameras(mut self, cameras: Arc<dyn CameraFactory>) -> Self {
        self.cameras = Some(cameras);
        self
    }

    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Where advisories are shown. Defaults to the event bus.
    pub fn notice_sink(mut self, sink: Arc<dyn NoticeSink>) -> Self {
        self.notice_sink = Some(sink);
        self
    }

    /// Share a surface tracker with the windowing layer
    pub fn surface(mut self, surface: Arc<SurfaceTracker>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn build(self) -> Result<SessionStateMachine> {
        let monitor = self
            .monitor
            .ok_or_else(|| UvcPreviewError::system("Device monitor must be specified"))?;
        let cameras = self
            .cameras
            .ok_or_else(|| UvcPreviewError::system("Camera factory must be specified"))?;

        self.config.validate()?;

        let event_bus = self
            .event_bus
            .unwrap_or_else(|| EventBus::new(self.config.system.event_bus_capacity));
        let sink: Arc<dyn NoticeSink> = match self.notice_sink {
            Some(sink) => sink,
            None if self.config.advisory.enabled => Arc::new(event_bus.clone()),
            None => Arc::new(LogNoticeSink),
        };
        let advisories = Arc::new(AdvisoryNotifier::new(self.config.advisory.clone(), sink));
        let surface = self.surface.unwrap_or_default();

        Ok(SessionStateMachine::new(
            self.config.preview,
            self.config.device.filters,
            monitor,
            cameras,
            surface,
            advisories,
            event_bus,
        ))
    }
}

impl Default for SessionStateMachineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
