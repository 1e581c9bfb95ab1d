pub mod advisory;
pub mod app;
pub mod camera;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod monitor;
pub mod session;
pub mod simulated;
pub mod surface;

pub use advisory::{Advisory, AdvisoryNotifier, LogNoticeSink, NoticeSink};
pub use app::{ComponentState, PreviewOrchestrator, Scenario, ScenarioPlayer, ScenarioStep, ShutdownReason};
pub use camera::{CameraFactory, CameraResource, FrameEncoding, NegotiatedFormat, PreviewFormat};
pub use config::PreviewConfig;
pub use device::{DeviceFilter, DeviceId};
pub use error::{CameraError, EventBusError, MonitorError, Result, UvcPreviewError};
pub use events::{EventBus, EventFilter, EventReceiver, SessionEvent};
pub use monitor::{ControlBlock, DeviceMonitor, MonitorEvent};
pub use session::{SessionSnapshot, SessionState, SessionStateMachine, SessionStateMachineBuilder};
pub use surface::{RenderTarget, SurfaceEvent, SurfaceTracker};
