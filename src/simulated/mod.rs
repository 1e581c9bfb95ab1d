//! Simulated USB monitor and UVC camera for running without hardware.
//!
//! Every call is counted so callers can check that each opened camera and each
//! control block is released exactly once.

mod camera;
mod monitor;

pub use camera::{CameraFaults, CameraProbe, FaultKind, SimulatedCamera, SimulatedCameraFactory};
pub use monitor::{
    ControlBlockLedger, PermissionResponse, SimulatedControlBlock, SimulatedDeviceMonitor,
};
