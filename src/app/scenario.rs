//! Scripted sessions against the simulated collaborators.
//!
//! A scenario is a TOML file naming the camera to simulate, how the simulated
//! user answers permission prompts, the camera fault plan and a list of steps:
//!
//! ```toml
//! permission = "grant"
//!
//! [faults]
//! rejected_formats = [{ width = 1280, height = 720, encoding = "mjpeg" }]
//!
//! [[steps]]
//! action = "surface_available"
//! width = 1920
//! height = 1080
//!
//! [[steps]]
//! action = "attach"
//! ```

use crate::device::DeviceId;
use crate::error::{Result, UvcPreviewError};
use crate::monitor::MonitorEvent;
use crate::session::SessionStateMachine;
use crate::simulated::{
    CameraFaults, ControlBlockLedger, PermissionResponse, SimulatedCameraFactory,
    SimulatedDeviceMonitor,
};
use crate::surface::{RenderTarget, SurfaceEvent};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

fn default_device() -> DeviceId {
    DeviceId::new(0x046D, 0x085E)
}

fn default_step_delay_ms() -> u64 {
    20
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Camera used by steps that do not name one
    #[serde(default = "default_device")]
    pub device: DeviceId,
    #[serde(default)]
    pub permission: PermissionResponse,
    /// Pause between steps when played through the event channels
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    #[serde(default)]
    pub faults: CameraFaults,
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Host became active
    Start,
    /// Host went to the background
    Stop,
    Attach {
        #[serde(default)]
        device: Option<DeviceId>,
    },
    Detach {
        #[serde(default)]
        device: Option<DeviceId>,
    },
    /// Permission granted without going through a prompt
    Connect {
        #[serde(default)]
        device: Option<DeviceId>,
    },
    Disconnect {
        #[serde(default)]
        device: Option<DeviceId>,
    },
    Cancel {
        #[serde(default)]
        device: Option<DeviceId>,
    },
    SurfaceAvailable {
        width: u32,
        height: u32,
    },
    SurfaceSizeChanged {
        width: u32,
        height: u32,
    },
    SurfaceDestroyed,
    /// Change how later permission prompts are answered
    Permission {
        response: PermissionResponse,
    },
    /// Replace the fault plan for cameras opened from now on
    Faults {
        faults: CameraFaults,
    },
    Pause {
        millis: u64,
    },
}

impl Scenario {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Surface first, then a camera that is granted on attach, resized and
    /// finally unplugged.
    pub fn demo() -> Self {
        Self {
            device: default_device(),
            permission: PermissionResponse::Grant,
            step_delay_ms: default_step_delay_ms(),
            faults: CameraFaults::default(),
            steps: vec![
                ScenarioStep::SurfaceAvailable {
                    width: 1920,
                    height: 1080,
                },
                ScenarioStep::Attach { device: None },
                ScenarioStep::SurfaceSizeChanged {
                    width: 1080,
                    height: 1920,
                },
                ScenarioStep::SurfaceDestroyed,
                ScenarioStep::SurfaceAvailable {
                    width: 1080,
                    height: 1920,
                },
                ScenarioStep::Disconnect { device: None },
                ScenarioStep::Detach { device: None },
            ],
        }
    }
}

/// Drives a scenario against a session built on simulated collaborators
pub struct ScenarioPlayer {
    ledger: Arc<ControlBlockLedger>,
    cameras: SimulatedCameraFactory,
    monitor: Arc<SimulatedDeviceMonitor>,
    next_surface_id: AtomicU64,
}

impl ScenarioPlayer {
    pub fn new(
        ledger: Arc<ControlBlockLedger>,
        cameras: SimulatedCameraFactory,
        monitor: Arc<SimulatedDeviceMonitor>,
    ) -> Self {
        Self {
            ledger,
            cameras,
            monitor,
            next_surface_id: AtomicU64::new(1),
        }
    }

    pub fn ledger(&self) -> &Arc<ControlBlockLedger> {
        &self.ledger
    }

    pub fn cameras(&self) -> &SimulatedCameraFactory {
        &self.cameras
    }

    /// Run every step directly on `machine`, in order, on the calling thread.
    ///
    /// A granted permission prompt is only delivered if the monitor was built
    /// with an event channel; script an explicit `connect` step otherwise.
    pub fn apply(&self, scenario: &Scenario, machine: &SessionStateMachine) {
        self.prepare(scenario);
        for step in &scenario.steps {
            debug!("Scenario step: {:?}", step);
            match step {
                ScenarioStep::Start => machine.start(),
                ScenarioStep::Stop => machine.stop(),
                ScenarioStep::Pause { millis } => {
                    std::thread::sleep(Duration::from_millis(*millis))
                }
                other => {
                    if let Some(event) = self.monitor_event(scenario, other) {
                        machine.handle_monitor_event(event);
                    } else if let Some(event) = self.surface_event(other) {
                        machine.handle_surface_event(event);
                    } else {
                        self.reconfigure(other);
                    }
                }
            }
        }
    }

    /// Send every step through the event channels the orchestrator pumps,
    /// pausing `step_delay_ms` between steps.
    pub async fn play(
        &self,
        scenario: &Scenario,
        machine: Arc<SessionStateMachine>,
        monitor_events: &mpsc::UnboundedSender<MonitorEvent>,
        surface_events: &mpsc::UnboundedSender<SurfaceEvent>,
    ) -> Result<()> {
        self.prepare(scenario);
        let delay = Duration::from_millis(scenario.step_delay_ms);

        for step in &scenario.steps {
            debug!("Scenario step: {:?}", step);
            match step {
                ScenarioStep::Start => {
                    let machine = Arc::clone(&machine);
                    run_blocking(move || machine.start()).await?;
                }
                ScenarioStep::Stop => {
                    let machine = Arc::clone(&machine);
                    run_blocking(move || machine.stop()).await?;
                }
                ScenarioStep::Pause { millis } => {
                    tokio::time::sleep(Duration::from_millis(*millis)).await
                }
                other => {
                    if let Some(event) = self.monitor_event(scenario, other) {
                        monitor_events.send(event).map_err(|e| {
                            UvcPreviewError::component(
                                "scenario".to_string(),
                                format!("monitor channel closed: {}", e),
                            )
                        })?;
                    } else if let Some(event) = self.surface_event(other) {
                        surface_events.send(event).map_err(|e| {
                            UvcPreviewError::component(
                                "scenario".to_string(),
                                format!("surface channel closed: {}", e),
                            )
                        })?;
                    } else {
                        self.reconfigure(other);
                    }
                }
            }
            tokio::time::sleep(delay).await;
        }

        info!("Scenario finished after {} steps", scenario.steps.len());
        Ok(())
    }

    fn prepare(&self, scenario: &Scenario) {
        self.monitor.set_response(scenario.permission);
        self.cameras.set_faults(scenario.faults.clone());
    }

    fn monitor_event(&self, scenario: &Scenario, step: &ScenarioStep) -> Option<MonitorEvent> {
        let pick = |device: &Option<DeviceId>| device.unwrap_or(scenario.device);
        match step {
            ScenarioStep::Attach { device } => Some(MonitorEvent::Attach {
                device: pick(device),
            }),
            ScenarioStep::Detach { device } => Some(MonitorEvent::Detach {
                device: pick(device),
            }),
            ScenarioStep::Connect { device } => {
                let device = pick(device);
                Some(MonitorEvent::Connect {
                    device,
                    control_block: Box::new(self.ledger.issue(device)),
                })
            }
            ScenarioStep::Disconnect { device } => Some(MonitorEvent::Disconnect {
                device: pick(device),
            }),
            ScenarioStep::Cancel { device } => Some(MonitorEvent::Cancel {
                device: pick(device),
            }),
            _ => None,
        }
    }

    fn surface_event(&self, step: &ScenarioStep) -> Option<SurfaceEvent> {
        match step {
            ScenarioStep::SurfaceAvailable { width, height } => Some(SurfaceEvent::Available {
                target: RenderTarget::new(
                    self.next_surface_id.fetch_add(1, Ordering::Relaxed),
                    *width,
                    *height,
                ),
            }),
            ScenarioStep::SurfaceSizeChanged { width, height } => {
                Some(SurfaceEvent::SizeChanged {
                    width: *width,
                    height: *height,
                })
            }
            ScenarioStep::SurfaceDestroyed => Some(SurfaceEvent::Destroyed),
            _ => None,
        }
    }

    fn reconfigure(&self, step: &ScenarioStep) {
        match step {
            ScenarioStep::Permission { response } => self.monitor.set_response(*response),
            ScenarioStep::Faults { faults } => self.cameras.set_faults(faults.clone()),
            _ => {}
        }
    }
}

async fn run_blocking<F>(f: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        UvcPreviewError::component("scenario".to_string(), format!("step failed: {}", e))
    })
}
