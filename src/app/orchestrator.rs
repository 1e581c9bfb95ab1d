use super::types::{ComponentState, ShutdownReason};
use crate::camera::CameraFactory;
use crate::config::PreviewConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::monitor::DeviceMonitor;
use crate::session::{SessionSnapshot, SessionStateMachine, SessionStateMachineBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Host application: owns the session and pumps both event sources into it
pub struct PreviewOrchestrator {
    pub(super) config: PreviewConfig,
    pub(super) machine: Arc<SessionStateMachine>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) pumps: Vec<JoinHandle<()>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl PreviewOrchestrator {
    /// Create a new orchestrator with the given configuration and collaborators
    pub fn new(
        config: PreviewConfig,
        monitor: Arc<dyn DeviceMonitor>,
        cameras: Arc<dyn CameraFactory>,
    ) -> Result<Self> {
        let event_bus = EventBus::new(config.system.event_bus_capacity);
        let machine = SessionStateMachineBuilder::new()
            .config(config.clone())
            .monitor(monitor)
            .cameras(cameras)
            .event_bus(event_bus)
            .build()?;
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Ok(Self {
            config,
            machine: Arc::new(machine),
            component_states: Arc::new(Mutex::new(HashMap::new())),
            pumps: Vec::new(),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn machine(&self) -> Arc<SessionStateMachine> {
        Arc::clone(&self.machine)
    }

    pub fn event_bus(&self) -> EventBus {
        self.machine.event_bus().clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.machine.snapshot()
    }

    /// Token that stops the event pumps and ends `run` when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        let mut states = self.component_states.lock().await;
        debug!("Component '{}' state changed to: {:?}", component, state);
        states.insert(component.to_string(), state);
    }

    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.lock().await.get(component).cloned()
    }
}
