use crate::camera::{CameraFactory, CameraResource, PreviewFormat};
use crate::error::CameraError;
use crate::monitor::ControlBlock;
use crate::surface::RenderTarget;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Failure kinds the simulated camera can be told to report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Busy,
    Power,
    Format,
    Driver,
}

impl FaultKind {
    pub fn to_error(self) -> CameraError {
        match self {
            FaultKind::Busy => CameraError::DeviceBusy,
            FaultKind::Power => CameraError::InsufficientPower,
            FaultKind::Format => CameraError::UnsupportedFormat {
                format: "stream".to_string(),
            },
            FaultKind::Driver => CameraError::driver("simulated driver fault"),
        }
    }
}

/// Faults applied to every camera created after they are set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraFaults {
    pub open: Option<FaultKind>,
    /// Formats the camera refuses in `set_preview_format`
    pub rejected_formats: Vec<PreviewFormat>,
    pub auto_focus_unsupported: bool,
    pub bind: Option<FaultKind>,
    pub start: Option<FaultKind>,
    pub stop: Option<FaultKind>,
    pub close: Option<FaultKind>,
}

/// Call counters shared by every camera a factory creates
#[derive(Debug, Default)]
pub struct CameraProbe {
    pub created: AtomicUsize,
    pub opens: AtomicUsize,
    pub open_failures: AtomicUsize,
    pub binds: AtomicUsize,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub closes: AtomicUsize,
    pub releases: AtomicUsize,
    /// Cameras opened and not yet released
    pub live: AtomicUsize,
    /// Highest value `live` ever reached
    pub max_live: AtomicUsize,
    /// Formats accepted, in order
    pub applied_formats: Mutex<Vec<PreviewFormat>>,
}

impl CameraProbe {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn opened(&self) {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);
    }
}

/// In-process UVC camera that honours a fault plan
pub struct SimulatedCamera {
    id: usize,
    faults: CameraFaults,
    probe: Arc<CameraProbe>,
    open: bool,
    opened: bool,
    released: bool,
    target: Option<RenderTarget>,
}

impl SimulatedCamera {
    fn check(fault: Option<FaultKind>) -> Result<(), CameraError> {
        match fault {
            Some(kind) => Err(kind.to_error()),
            None => Ok(()),
        }
    }

    fn ensure_open(&self) -> Result<(), CameraError> {
        if self.open {
            Ok(())
        } else {
            Err(CameraError::NotOpen)
        }
    }
}

impl CameraResource for SimulatedCamera {
    fn open(&mut self, control_block: &dyn ControlBlock) -> Result<(), CameraError> {
        if let Err(e) = Self::check(self.faults.open) {
            self.probe.open_failures.fetch_add(1, Ordering::SeqCst);
            return Err(e);
        }
        debug!(
            "Simulated camera {} opened on {}",
            self.id,
            control_block.device()
        );
        self.open = true;
        self.opened = true;
        self.probe.opened();
        Ok(())
    }

    fn set_preview_format(&mut self, format: &PreviewFormat) -> Result<(), CameraError> {
        self.ensure_open()?;
        if self.faults.rejected_formats.contains(format) {
            return Err(CameraError::UnsupportedFormat {
                format: format.to_string(),
            });
        }
        self.probe.applied_formats.lock().push(*format);
        Ok(())
    }

    fn set_auto_focus(&mut self, _enabled: bool) -> Result<(), CameraError> {
        self.ensure_open()?;
        if self.faults.auto_focus_unsupported {
            return Err(CameraError::FeatureUnsupported {
                feature: "auto focus".to_string(),
            });
        }
        Ok(())
    }

    fn bind_render_target(&mut self, target: &RenderTarget) -> Result<(), CameraError> {
        self.ensure_open()?;
        Self::check(self.faults.bind)?;
        self.probe.binds.fetch_add(1, Ordering::SeqCst);
        self.target = Some(*target);
        Ok(())
    }

    fn start_stream(&mut self) -> Result<(), CameraError> {
        self.ensure_open()?;
        if self.target.is_none() {
            return Err(CameraError::driver("no render target bound"));
        }
        Self::check(self.faults.start)?;
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        trace!("Simulated camera {} streaming", self.id);
        Ok(())
    }

    fn stop_stream(&mut self) -> Result<(), CameraError> {
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
        Self::check(self.faults.stop)
    }

    fn close(&mut self) -> Result<(), CameraError> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        self.open = false;
        Self::check(self.faults.close)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.probe.releases.fetch_add(1, Ordering::SeqCst);
        if self.opened {
            self.probe.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Creates simulated cameras and exposes their shared probe and fault plan
#[derive(Clone, Default)]
pub struct SimulatedCameraFactory {
    faults: Arc<Mutex<CameraFaults>>,
    probe: Arc<CameraProbe>,
}

impl SimulatedCameraFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: CameraFaults) -> Self {
        let factory = Self::new();
        factory.set_faults(faults);
        factory
    }

    /// Replace the fault plan for cameras created from now on
    pub fn set_faults(&self, faults: CameraFaults) {
        *self.faults.lock() = faults;
    }

    pub fn probe(&self) -> Arc<CameraProbe> {
        Arc::clone(&self.probe)
    }
}

impl CameraFactory for SimulatedCameraFactory {
    fn create(&self) -> Box<dyn CameraResource> {
        let id = self.probe.created.fetch_add(1, Ordering::SeqCst);
        Box::new(SimulatedCamera {
            id,
            faults: self.faults.lock().clone(),
            probe: Arc::clone(&self.probe),
            open: false,
            opened: false,
            released: false,
            target: None,
        })
    }
}
