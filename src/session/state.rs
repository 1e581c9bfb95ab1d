use crate::camera::NegotiatedFormat;
use crate::device::DeviceId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle state of the single camera session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No control block, no camera
    Idle,
    /// Control block received, camera open in progress
    Opening,
    /// Camera open and configured, not streaming
    Open,
    /// Camera bound to a ready surface, frames flowing
    Streaming,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Opening => "opening",
            SessionState::Open => "open",
            SessionState::Streaming => "streaming",
        };
        write!(f, "{}", name)
    }
}

/// Point-in-time view of the session for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub session_id: Option<Uuid>,
    pub device: Option<DeviceId>,
    pub format: Option<NegotiatedFormat>,
    pub holds_control_block: bool,
    pub surface_ready: bool,
    pub monitor_registered: bool,
}
